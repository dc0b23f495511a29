//! Culture (growing) catalog.

use crate::catalog::{ratio, round_to, Section};
use crate::field::{CompositeKind, FieldDefinition as F, FieldKind as K, Record, Value};

const MODES: &[&str] = &["indoor", "outdoor", "greenhouse", "notill", "other"];
const SPACES: &[&str] = &[
    "tent", "closet", "room", "greenhouse", "outdoor", "guerilla", "other",
];
const PROPAGATION: &[&str] = &["seed", "clone", "cutting", "tissue", "other"];
const GERMINATION: &[&str] = &["soil", "paper", "water", "rockwool", "jiffy"];
const SEED_TYPES: &[&str] = &["regular", "feminized", "auto"];
const SUBSTRATES: &[&str] = &[
    "soil",
    "coco",
    "rockwool",
    "living-soil",
    "hydro-dtw",
    "dwc",
    "nft",
    "aero",
    "other",
];
const SUBSTRATE_PARTS: &[&str] = &[
    "soil",
    "coco",
    "perlite",
    "vermiculite",
    "compost",
    "humus",
    "biochar",
    "sand",
    "rockwool",
    "other",
];
const SUBSTRATE_BRANDS: &[&str] = &[
    "BioBizz", "Plagron", "Canna", "Atami", "Gold Label", "Hesi",
];
const IRRIGATION: &[&str] = &[
    "manual", "drip", "flood", "dtw", "autopot", "rdwc", "other",
];
const WATER_TYPES: &[&str] = &["tap", "ro", "spring", "rain", "mix"];
const FERTILIZER_TYPES: &[&str] = &[
    "organic",
    "mineral",
    "organo-mineral",
    "living-soil",
    "other",
];
const FERTILIZER_BRANDS: &[&str] = &[
    "BioBizz",
    "Advanced Nutrients",
    "General Hydroponics",
    "Canna",
    "Plagron",
    "Hesi",
];
const FERTILIZER_LINES: &[&str] = &[
    "grow", "bloom", "booster", "calmag", "pk", "enzymes", "microbes", "vitamins", "other",
];
const LIGHT_TYPES: &[&str] = &["led", "hps", "mh", "cmh", "cfl", "natural", "mixed"];
const SPECTRA: &[&str] = &["full", "veg", "bloom", "uv", "farred", "other"];
const CO2_MODES: &[&str] = &["continuous", "phases"];
const VENTILATION: &[&str] = &["extract-intake", "extract-only", "passive-fans", "other"];
const TRAINING: &[&str] = &[
    "lst",
    "hst",
    "topping",
    "fimming",
    "mainlining",
    "scrog",
    "sog",
    "supercropping",
    "defoliation",
    "lollipopping",
    "schwazzing",
    "other",
];
const PLANT_VOLUMES: &[&str] = &["small", "medium", "large", "xlarge"];
const INTERNODES: &[&str] = &["tight", "medium", "wide"];
const TRICHOMES: &[&str] = &["clear", "milky", "amber"];
const PISTILS: &[&str] = &["white", "orange", "brown", "mixed"];
const TRIM_TYPES: &[&str] = &["wet", "dry", "machine", "none"];
const SEVERITY: &[&str] = &["none", "light", "moderate", "severe"];

pub fn sections() -> Vec<Section> {
    vec![
        Section::new(
            "general",
            "General",
            vec![
                F::new("startDate", "Start date", K::Date),
                F::new("endDate", "End date", K::Date),
                F::new(
                    "duration",
                    "Total duration",
                    K::computed(&["startDate", "endDate"], duration),
                )
                .unit("days"),
                F::new("mode", "Growing mode", K::select(MODES)),
                F::new("spaceType", "Space type", K::select(SPACES)),
                F::new(
                    "dimensions",
                    "Dimensions (LxWxH)",
                    K::Composite(CompositeKind::Dimensions),
                )
                .unit("cm")
                .default_value(Value::object([
                    ("length", 120.0),
                    ("width", 120.0),
                    ("height", 200.0),
                ])),
                F::new(
                    "surfaceAuSol",
                    "Floor area",
                    K::computed(&["dimensions"], floor_area),
                )
                .unit("m²"),
                F::new(
                    "volumeTotal",
                    "Total volume",
                    K::computed(&["dimensions"], total_volume),
                )
                .unit("m³"),
                F::new(
                    "densitePlantation",
                    "Planting density",
                    K::slider(0.5, 16.0, 0.5),
                )
                .unit("plants/m²")
                .default_value(4.0),
                F::new("plantCount", "Plant count", K::stepper(1.0, 500.0))
                    .default_value(1.0),
            ],
        ),
        Section::new(
            "environment",
            "Environment & substrate",
            vec![
                F::new("propagation", "Propagation method", K::select(PROPAGATION)),
                F::new(
                    "germinationMethod",
                    "Germination method",
                    K::select(GERMINATION),
                )
                .visible_when("propagation", from_seed),
                F::new("seedType", "Seed type", K::select(SEED_TYPES))
                    .visible_when("propagation", from_seed),
                F::new("substrateType", "Substrate type", K::select(SUBSTRATES)),
                F::new("potVolume", "Pot volume", K::slider(0.5, 100.0, 0.5))
                    .unit("L")
                    .default_value(11.0),
                F::new(
                    "substrateComposition",
                    "Substrate composition",
                    K::Composite(CompositeKind::Pie {
                        parts: SUBSTRATE_PARTS,
                    }),
                )
                .unit("%")
                .visible_when("substrateType", mixed_substrate),
                F::new(
                    "substrateBrand",
                    "Substrate brand",
                    K::Autocomplete {
                        suggestions: SUBSTRATE_BRANDS,
                    },
                ),
            ],
        ),
        Section::new(
            "irrigation",
            "Irrigation & nutrient solution",
            vec![
                F::new("irrigationType", "Irrigation type", K::select(IRRIGATION)),
                F::new(
                    "irrigationFrequency",
                    "Watering frequency",
                    K::Composite(CompositeKind::Frequency),
                )
                .default_value(Value::object([
                    ("count", Value::from(2.0)),
                    ("per", Value::from("day")),
                ])),
                F::new("waterVolume", "Volume per watering", K::slider(0.1, 5.0, 0.1))
                    .unit("L")
                    .default_value(1.0),
                F::new("waterPH", "Water pH", K::slider(4.5, 8.0, 0.1)).default_value(6.5),
                F::new("waterEC", "EC", K::slider(0.2, 3.0, 0.1))
                    .unit("mS/cm")
                    .default_value(1.2),
                F::new("waterType", "Water type", K::select(WATER_TYPES)),
            ],
        ),
        Section::new(
            "fertilizer",
            "Fertiliser & nutrition",
            vec![
                F::new(
                    "fertilizerType",
                    "Fertiliser type",
                    K::select(FERTILIZER_TYPES),
                ),
                F::new(
                    "fertilizerBrand",
                    "Fertiliser brand",
                    K::Autocomplete {
                        suggestions: FERTILIZER_BRANDS,
                    },
                ),
                F::new(
                    "fertilizerLine",
                    "Products used",
                    K::multiselect(FERTILIZER_LINES),
                ),
                F::new("fertilizerDosage", "Dosage", K::slider(0.1, 5.0, 0.1))
                    .unit("mL/L")
                    .default_value(2.0),
                F::new(
                    "fertilizerFrequency",
                    "Feeding frequency",
                    K::Composite(CompositeKind::Frequency),
                ),
            ],
        ),
        Section::new(
            "light",
            "Light",
            vec![
                F::new("lightType", "Lamp type", K::select(LIGHT_TYPES)),
                F::new("lightCount", "Lamp count", K::stepper(1.0, 20.0)).default_value(1.0),
                F::new(
                    "lightPowerPerUnit",
                    "Power per lamp",
                    K::slider(10.0, 1000.0, 10.0),
                )
                .unit("W")
                .default_value(250.0),
                F::new(
                    "lightTotalPower",
                    "Total power",
                    K::computed(&["lightCount", "lightPowerPerUnit"], light_total_power),
                )
                .unit("W"),
                F::new(
                    "lightDistance",
                    "Lamp distance",
                    K::slider(10.0, 200.0, 5.0),
                )
                .unit("cm")
                .default_value(50.0),
                F::new(
                    "photoperiod",
                    "Photoperiod",
                    K::Composite(CompositeKind::Photoperiod),
                )
                .default_value(Value::object([("on", 18.0), ("off", 6.0)])),
                F::new("ppfd", "Average PPFD", K::slider(200.0, 1200.0, 50.0))
                    .unit("µmol/m²/s")
                    .default_value(600.0),
                F::new("dli", "DLI", K::slider(10.0, 60.0, 1.0))
                    .unit("mol/m²/d")
                    .default_value(30.0),
                F::new("spectrum", "Spectrum", K::select(SPECTRA)),
                F::new("spectrumImage", "Spectrum chart", K::Image),
            ],
        ),
        Section::new(
            "climate",
            "Climate",
            vec![
                F::new(
                    "temperatureDay",
                    "Day temperature",
                    K::slider(10.0, 35.0, 0.5),
                )
                .unit("°C")
                .default_value(24.0),
                F::new(
                    "temperatureNight",
                    "Night temperature",
                    K::slider(10.0, 35.0, 0.5),
                )
                .unit("°C")
                .default_value(18.0),
                F::new("humidityDay", "Day humidity", K::slider(20.0, 90.0, 5.0))
                    .unit("%")
                    .default_value(60.0),
                F::new(
                    "humidityNight",
                    "Night humidity",
                    K::slider(20.0, 90.0, 5.0),
                )
                .unit("%")
                .default_value(50.0),
                F::new(
                    "vpd",
                    "VPD",
                    K::computed(&["temperatureDay", "humidityDay"], vpd),
                )
                .unit("kPa"),
                F::new("co2Enabled", "CO2 enrichment", K::Toggle).default_value(false),
                F::new("co2Level", "CO2 level", K::slider(400.0, 1600.0, 50.0))
                    .unit("ppm")
                    .default_value(1200.0)
                    .visible_when("co2Enabled", co2_enabled),
                F::new("co2Mode", "CO2 mode", K::select(CO2_MODES))
                    .visible_when("co2Enabled", co2_enabled),
                F::new(
                    "ventilationType",
                    "Ventilation type",
                    K::select(VENTILATION),
                ),
                F::new(
                    "ventilationIntensity",
                    "Ventilation intensity",
                    K::slider(0.0, 10.0, 1.0),
                )
                .default_value(5.0),
            ],
        ),
        Section::new(
            "training",
            "Training",
            vec![
                F::new("trainingMethods", "Training methods", K::multiselect(TRAINING)),
                F::new(
                    "trainingIntensity",
                    "Training intensity",
                    K::slider(0.0, 10.0, 1.0),
                )
                .default_value(5.0),
                F::new("trainingNotes", "Training notes", K::textarea()),
            ],
        )
        .collapsed(),
        Section::new(
            "morphology",
            "Morphology",
            vec![
                F::new("plantHeight", "Plant height", K::slider(10.0, 300.0, 5.0))
                    .unit("cm")
                    .default_value(100.0),
                F::new("canopyWidth", "Canopy width", K::slider(10.0, 200.0, 5.0))
                    .unit("cm")
                    .default_value(60.0),
                F::new("plantVolume", "Approximate volume", K::select(PLANT_VOLUMES)),
                F::new("mainBranches", "Main branches", K::stepper(1.0, 32.0))
                    .default_value(8.0),
                F::new("visibleBuds", "Visible buds", K::stepper(1.0, 200.0))
                    .default_value(20.0),
                F::new("internodeSpacing", "Internode spacing", K::select(INTERNODES)),
            ],
        )
        .collapsed(),
        Section::new(
            "harvest",
            "Harvest & yield",
            vec![
                F::new("harvestDate", "Harvest date", K::Date),
                F::new("flushDuration", "Flush duration", K::stepper(0.0, 21.0))
                    .unit("days")
                    .default_value(7.0),
                F::new("trichomeColor", "Trichome colour", K::multiselect(TRICHOMES)),
                F::new("pistilColor", "Pistil colour", K::select(PISTILS)),
                F::new("wetWeight", "Wet weight", K::slider(10.0, 5000.0, 10.0))
                    .unit("g")
                    .default_value(500.0),
                F::new("dryWeight", "Dry weight", K::slider(1.0, 1000.0, 5.0))
                    .unit("g")
                    .default_value(100.0),
                F::new("trimType", "Trim type", K::select(TRIM_TYPES)),
                F::new(
                    "yieldPerPlant",
                    "Yield per plant",
                    K::computed(&["dryWeight", "plantCount"], yield_per_plant),
                )
                .unit("g/plant"),
                F::new(
                    "yieldPerM2",
                    "Yield per m²",
                    K::computed(&["dryWeight", "surfaceAuSol"], yield_per_m2),
                )
                .unit("g/m²"),
                F::new(
                    "yieldPerWatt",
                    "Yield per watt",
                    K::computed(&["dryWeight", "lightTotalPower"], yield_per_watt),
                )
                .unit("g/W"),
                F::new("moldDetected", "Mould detected", K::select(SEVERITY))
                    .default_value("none"),
                F::new("pestDamage", "Pest damage", K::select(SEVERITY)).default_value("none"),
                F::new(
                    "overallHarvestQuality",
                    "Overall harvest quality",
                    K::slider(0.0, 10.0, 0.5),
                )
                .default_value(7.0),
                F::new("harvestNotes", "Harvest notes", K::textarea()),
            ],
        )
        .collapsed(),
    ]
}

fn from_seed(record: &Record) -> bool {
    record.text("propagation") == Some("seed")
}

fn mixed_substrate(record: &Record) -> bool {
    matches!(
        record.text("substrateType"),
        Some("soil" | "coco" | "living-soil")
    )
}

fn co2_enabled(record: &Record) -> bool {
    record.flag("co2Enabled")
}

fn duration(record: &Record) -> Value {
    match (record.date("startDate"), record.date("endDate")) {
        (Some(start), Some(end)) => Value::Number((end - start).num_days().abs() as f64),
        _ => Value::Number(0.0),
    }
}

fn dimension(record: &Record, key: &str) -> f64 {
    record.member_number("dimensions", key).unwrap_or(0.0) / 100.0
}

fn floor_area(record: &Record) -> Value {
    let area = dimension(record, "length") * dimension(record, "width");
    Value::Number(round_to(area, 2))
}

fn total_volume(record: &Record) -> Value {
    let volume =
        dimension(record, "length") * dimension(record, "width") * dimension(record, "height");
    Value::Number(round_to(volume, 2))
}

fn light_total_power(record: &Record) -> Value {
    let count = record.number("lightCount").unwrap_or(1.0);
    Value::Number(count * record.number_or_zero("lightPowerPerUnit"))
}

/// Saturation vapour pressure (Tetens) times the humidity deficit, in kPa.
fn vpd(record: &Record) -> Value {
    let (Some(t), Some(rh)) = (record.number("temperatureDay"), record.number("humidityDay"))
    else {
        return Value::Number(0.0);
    };
    let svp = 0.6108 * ((17.27 * t) / (t + 237.3)).exp();
    Value::Number(round_to(svp * (1.0 - rh / 100.0), 2))
}

fn yield_per_plant(record: &Record) -> Value {
    ratio(
        record.number_or_zero("dryWeight"),
        record.number_or_zero("plantCount"),
        1,
    )
}

fn yield_per_m2(record: &Record) -> Value {
    ratio(
        record.number_or_zero("dryWeight"),
        record.number_or_zero("surfaceAuSol"),
        1,
    )
}

fn yield_per_watt(record: &Record) -> Value {
    ratio(
        record.number_or_zero("dryWeight"),
        record.number_or_zero("lightTotalPower"),
        2,
    )
}
