//! Curing catalog.

use crate::catalog::{ratio, round_to, Section};
use crate::field::{FieldDefinition as F, FieldKind as K, Record, Value};

const CURING_TYPES: &[&str] = &["cold", "warm", "room", "controlled"];
const CONTAINERS: &[&str] = &[
    "glass", "plastic", "metal", "wood", "bag", "open-air", "other",
];
const PACKAGING: &[&str] = &[
    "cellophane",
    "parchment",
    "aluminum",
    "hash-paper",
    "vacuum-bag",
    "freezer-bag",
    "none",
];
const OPACITY: &[&str] = &["opaque", "semi-opaque", "transparent", "amber"];
const HUMIDITY_CONTROL: &[&str] = &["none", "boveda", "integra", "orange-peel", "humidor"];
const LIGHT_EXPOSURE: &[&str] = &["dark", "low", "indirect", "direct"];
const AIR_CIRCULATION: &[&str] = &["sealed", "minimal", "moderate", "open"];
const BURPING: &[&str] = &["none", "daily", "every-2-days", "weekly", "monthly"];

const VISUAL_NOTES: &[&str] = &["colorNote", "densityNote", "trichomeNote"];

pub fn sections() -> Vec<Section> {
    vec![
        Section::new(
            "setup",
            "Curing setup",
            vec![
                F::new("curingType", "Curing type", K::select(CURING_TYPES))
                    .default_value("room"),
                F::new("containerType", "Container type", K::select(CONTAINERS)),
                F::new(
                    "containerVolume",
                    "Container volume",
                    K::slider(10.0, 10000.0, 10.0),
                )
                .unit("mL")
                .default_value(500.0),
                F::new(
                    "productVolume",
                    "Product volume",
                    K::slider(1.0, 10000.0, 1.0),
                )
                .unit("mL")
                .default_value(250.0),
                F::new(
                    "fillRate",
                    "Fill rate",
                    K::computed(&["containerVolume", "productVolume"], fill_rate),
                )
                .unit("%"),
                F::new("packaging", "Primary packaging", K::multiselect(PACKAGING)),
                F::new("containerOpacity", "Container opacity", K::select(OPACITY))
                    .default_value("amber"),
                F::new(
                    "humidityControl",
                    "Humidity control",
                    K::select(HUMIDITY_CONTROL),
                ),
                F::new("targetHumidity", "Target humidity", K::slider(40.0, 75.0, 1.0))
                    .unit("%")
                    .default_value(62.0),
            ],
        ),
        Section::new(
            "environment",
            "Environment",
            vec![
                F::new("temperature", "Average temperature", K::slider(-5.0, 35.0, 0.5))
                    .unit("°C")
                    .default_value(18.0),
                F::new(
                    "ambientHumidity",
                    "Ambient humidity",
                    K::slider(20.0, 90.0, 5.0),
                )
                .unit("%")
                .default_value(50.0),
                F::new("lightExposure", "Light exposure", K::select(LIGHT_EXPOSURE))
                    .default_value("dark"),
                F::new(
                    "airCirculation",
                    "Air circulation",
                    K::select(AIR_CIRCULATION),
                )
                .default_value("minimal"),
                F::new("burpingFrequency", "Burping frequency", K::select(BURPING))
                    .visible_when("airCirculation", burping),
            ],
        ),
        Section::new(
            "evolution",
            "Evolution of notes",
            vec![
                F::new("colorNote", "Colour", K::slider(0.0, 10.0, 0.5)),
                F::new("densityNote", "Density", K::slider(0.0, 10.0, 0.5)),
                F::new("trichomeNote", "Trichomes", K::slider(0.0, 10.0, 0.5)),
                F::new(
                    "visualScore",
                    "Visual score",
                    K::computed(VISUAL_NOTES, visual_score),
                ),
                F::new("aromaIntensity", "Aroma intensity", K::slider(0.0, 10.0, 0.5)),
                F::new("tasteIntensity", "Taste intensity", K::slider(0.0, 10.0, 0.5)),
                F::new("moisture", "Product moisture", K::slider(0.0, 100.0, 1.0)).unit("%"),
                F::new("weight", "Weight", K::number()).unit("g"),
                F::new("moldRisk", "Mould risk", K::slider(0.0, 10.0, 1.0)),
                F::new(
                    "qualityImprovement",
                    "Quality change",
                    K::slider(-5.0, 5.0, 1.0),
                ),
                F::new("curingNotes", "Notes", K::textarea()),
            ],
        ),
    ]
}

fn burping(record: &Record) -> bool {
    record.text("airCirculation") == Some("minimal")
}

fn fill_rate(record: &Record) -> Value {
    ratio(
        record.number_or_zero("productVolume") * 100.0,
        record.number_or_zero("containerVolume"),
        1,
    )
}

/// Mean of the visual notes that were given; 0 when none were.
fn visual_score(record: &Record) -> Value {
    let notes: Vec<f64> = VISUAL_NOTES
        .iter()
        .filter_map(|id| record.number(id))
        .collect();
    if notes.is_empty() {
        return Value::Number(0.0);
    }
    Value::Number(round_to(notes.iter().sum::<f64>() / notes.len() as f64, 1))
}
