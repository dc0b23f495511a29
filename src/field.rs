use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::errors::ValueError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Periods accepted by the `frequency` composite.
pub const FREQUENCY_PERIODS: &[&str] = &["hour", "day", "week", "month"];

/// Key of a catalog field.
///
/// Handles outside the crate are obtained through [`crate::catalog::Catalog::field_id`],
/// which only hands out ids the live catalog knows about.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        FieldId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored field value. Serialises as plain JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    /// Build an object value from `(key, value)` pairs.
    pub fn object<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Text form used in tables. Lists and objects render as JSON.
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::List(_) | Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// The values of one cell, keyed by field. This is what visibility predicates
/// and compute functions read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<FieldId, Value>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.0.get(id)
    }

    pub fn number(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(Value::as_f64)
    }

    /// Numeric input with the neutral value for absent data.
    pub fn number_or_zero(&self, id: &str) -> f64 {
        self.number(id).unwrap_or(0.0)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    pub fn flag(&self, id: &str) -> bool {
        self.get(id).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn date(&self, id: &str) -> Option<NaiveDate> {
        self.text(id)
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
    }

    /// Numeric member of an object-valued field, e.g. `dimensions.length`.
    pub fn member_number(&self, id: &str, key: &str) -> Option<f64> {
        self.get(id)
            .and_then(Value::as_object)
            .and_then(|map| map.get(key))
            .and_then(Value::as_f64)
    }

    pub fn insert(&mut self, id: FieldId, value: Value) -> Option<Value> {
        self.0.insert(id, value)
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.0.shift_remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(FieldId, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (FieldId, Value)>>(iter: T) -> Self {
        Record(iter.into_iter().collect())
    }
}

pub type Predicate = fn(&Record) -> bool;
pub type ComputeFn = fn(&Record) -> Value;

/// Conditional visibility: the field is inert unless `when` holds.
#[derive(Clone, Copy, Debug)]
pub struct Visibility {
    pub depends_on: &'static str,
    pub when: Predicate,
}

/// Formula of a computed field. `inputs` are the ids `compute` reads.
#[derive(Clone, Copy, Debug)]
pub struct Computation {
    pub inputs: &'static [&'static str],
    pub compute: ComputeFn,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CompositeKind {
    /// `{length, width, height}` in centimetres.
    Dimensions,
    /// Percentage split over the named parts.
    Pie { parts: &'static [&'static str] },
    /// `{count, per}` where `per` is one of [`FREQUENCY_PERIODS`].
    Frequency,
    /// `{on, off}` hours of light and dark.
    Photoperiod,
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Text { max_len: Option<usize> },
    TextArea { max_len: Option<usize> },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    Slider { min: f64, max: f64, step: f64 },
    Stepper { min: f64, max: f64, step: f64 },
    Select { options: &'static [&'static str] },
    MultiSelect { options: &'static [&'static str] },
    Autocomplete { suggestions: &'static [&'static str] },
    Date,
    Toggle,
    Image,
    Composite(CompositeKind),
    Computed(Computation),
}

impl FieldKind {
    pub fn text() -> Self {
        FieldKind::Text { max_len: Some(200) }
    }

    pub fn textarea() -> Self {
        FieldKind::TextArea {
            max_len: Some(5000),
        }
    }

    pub fn number() -> Self {
        FieldKind::Number {
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn bounded(min: f64, max: f64, step: f64) -> Self {
        FieldKind::Number {
            min: Some(min),
            max: Some(max),
            step: Some(step),
        }
    }

    pub fn slider(min: f64, max: f64, step: f64) -> Self {
        FieldKind::Slider { min, max, step }
    }

    pub fn stepper(min: f64, max: f64) -> Self {
        FieldKind::Stepper {
            min,
            max,
            step: 1.0,
        }
    }

    pub fn select(options: &'static [&'static str]) -> Self {
        FieldKind::Select { options }
    }

    pub fn multiselect(options: &'static [&'static str]) -> Self {
        FieldKind::MultiSelect { options }
    }

    pub fn computed(inputs: &'static [&'static str], compute: ComputeFn) -> Self {
        FieldKind::Computed(Computation { inputs, compute })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::TextArea { .. } => "textarea",
            FieldKind::Number { .. } => "number",
            FieldKind::Slider { .. } => "slider",
            FieldKind::Stepper { .. } => "stepper",
            FieldKind::Select { .. } => "select",
            FieldKind::MultiSelect { .. } => "multiselect",
            FieldKind::Autocomplete { .. } => "autocomplete",
            FieldKind::Date => "date",
            FieldKind::Toggle => "toggle",
            FieldKind::Image => "image",
            FieldKind::Composite(CompositeKind::Dimensions) => "dimensions",
            FieldKind::Composite(CompositeKind::Pie { .. }) => "pie",
            FieldKind::Composite(CompositeKind::Frequency) => "frequency",
            FieldKind::Composite(CompositeKind::Photoperiod) => "photoperiod",
            FieldKind::Computed(_) => "computed",
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, FieldKind::Computed(_))
    }

    /// Check that `value` has the shape and bounds this kind accepts.
    pub fn validate(&self, field: &FieldId, value: &Value) -> Result<(), ValueError> {
        match self {
            FieldKind::Text { max_len } | FieldKind::TextArea { max_len } => {
                let text = expect_text(field, value)?;
                check_length(field, text, *max_len)
            }
            FieldKind::Number { min, max, .. } => {
                let n = expect_number(field, value)?;
                check_bounds(
                    field,
                    n,
                    min.unwrap_or(f64::NEG_INFINITY),
                    max.unwrap_or(f64::INFINITY),
                )
            }
            FieldKind::Slider { min, max, .. } => {
                let n = expect_number(field, value)?;
                check_bounds(field, n, *min, *max)
            }
            FieldKind::Stepper { min, max, .. } => {
                let n = expect_number(field, value)?;
                if n.fract() != 0.0 {
                    return Err(wrong_shape(field, "a whole number"));
                }
                check_bounds(field, n, *min, *max)
            }
            FieldKind::Select { options } => {
                let choice = expect_text(field, value)?;
                check_option(field, options, choice)
            }
            FieldKind::MultiSelect { options } => {
                let items = value
                    .as_list()
                    .ok_or_else(|| wrong_shape(field, "a list of options"))?;
                for item in items {
                    let choice = item
                        .as_str()
                        .ok_or_else(|| wrong_shape(field, "a list of options"))?;
                    check_option(field, options, choice)?;
                }
                Ok(())
            }
            FieldKind::Autocomplete { .. } | FieldKind::Image => {
                expect_text(field, value).map(|_| ())
            }
            FieldKind::Date => {
                let text = expect_text(field, value)?;
                NaiveDate::parse_from_str(text, DATE_FORMAT)
                    .map(|_| ())
                    .map_err(|_| wrong_shape(field, "a YYYY-MM-DD date"))
            }
            FieldKind::Toggle => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| wrong_shape(field, "true or false")),
            FieldKind::Composite(composite) => composite.validate(field, value),
            FieldKind::Computed(_) => Err(ValueError::Computed(field.to_string())),
        }
    }

    /// Parse the text form produced by [`Value::render`] back into a value.
    pub fn decode(&self, field: &FieldId, raw: &str) -> Result<Value, ValueError> {
        let value = match self {
            FieldKind::Number { .. } | FieldKind::Slider { .. } | FieldKind::Stepper { .. } => {
                raw.trim()
                    .parse::<f64>()
                    .map(Value::Number)
                    .map_err(|_| wrong_shape(field, "a number"))?
            }
            FieldKind::Toggle => match raw.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(wrong_shape(field, "true or false")),
            },
            FieldKind::MultiSelect { .. } | FieldKind::Composite(_) => {
                serde_json::from_str::<Value>(raw)
                    .map_err(|_| wrong_shape(field, "JSON text"))?
            }
            FieldKind::Computed(_) => return Err(ValueError::Computed(field.to_string())),
            FieldKind::Text { .. }
            | FieldKind::TextArea { .. }
            | FieldKind::Select { .. }
            | FieldKind::Autocomplete { .. }
            | FieldKind::Date
            | FieldKind::Image => Value::Text(raw.to_string()),
        };
        self.validate(field, &value)?;
        Ok(value)
    }

    /// Authoring checks run once when the catalog loads.
    pub(crate) fn check_constraints(&self) -> Result<(), String> {
        match self {
            FieldKind::Text { max_len } | FieldKind::TextArea { max_len } => match max_len {
                Some(0) => Err("max length must be positive".to_string()),
                _ => Ok(()),
            },
            FieldKind::Number { min, max, step } => {
                if let (Some(min), Some(max)) = (min, max) {
                    if min > max {
                        return Err(format!("min {min} is above max {max}"));
                    }
                }
                match step {
                    Some(step) if *step <= 0.0 => Err("step must be positive".to_string()),
                    _ => Ok(()),
                }
            }
            FieldKind::Slider { min, max, step } | FieldKind::Stepper { min, max, step } => {
                if min >= max {
                    Err(format!("min {min} must be below max {max}"))
                } else if *step <= 0.0 {
                    Err("step must be positive".to_string())
                } else {
                    Ok(())
                }
            }
            FieldKind::Select { options } | FieldKind::MultiSelect { options } => {
                check_option_list(options)
            }
            FieldKind::Composite(CompositeKind::Pie { parts }) => check_option_list(parts),
            FieldKind::Computed(computation) if computation.inputs.is_empty() => {
                Err("computed field has no inputs".to_string())
            }
            FieldKind::Autocomplete { .. }
            | FieldKind::Date
            | FieldKind::Toggle
            | FieldKind::Image
            | FieldKind::Composite(_)
            | FieldKind::Computed(_) => Ok(()),
        }
    }
}

impl CompositeKind {
    fn validate(&self, field: &FieldId, value: &Value) -> Result<(), ValueError> {
        let members = value
            .as_object()
            .ok_or_else(|| wrong_shape(field, self.expected()))?;
        match self {
            CompositeKind::Dimensions => {
                for (key, member) in members {
                    if !matches!(key.as_str(), "length" | "width" | "height") {
                        return Err(wrong_shape(field, self.expected()));
                    }
                    let n = expect_number(field, member)?;
                    check_bounds(field, n, 0.0, f64::INFINITY)?;
                }
                Ok(())
            }
            CompositeKind::Pie { parts } => {
                let mut total = 0.0;
                for (key, member) in members {
                    check_option(field, parts, key)?;
                    let share = expect_number(field, member)?;
                    check_bounds(field, share, 0.0, 100.0)?;
                    total += share;
                }
                check_bounds(field, total, 0.0, 100.0)
            }
            CompositeKind::Frequency => {
                let count = members
                    .get("count")
                    .ok_or_else(|| wrong_shape(field, self.expected()))?;
                let count = expect_number(field, count)?;
                check_bounds(field, count, 0.0, f64::INFINITY)?;
                let per = members
                    .get("per")
                    .and_then(Value::as_str)
                    .ok_or_else(|| wrong_shape(field, self.expected()))?;
                check_option(field, FREQUENCY_PERIODS, per)?;
                if members.len() != 2 {
                    return Err(wrong_shape(field, self.expected()));
                }
                Ok(())
            }
            CompositeKind::Photoperiod => {
                let mut total = 0.0;
                for key in ["on", "off"] {
                    let hours = members
                        .get(key)
                        .ok_or_else(|| wrong_shape(field, self.expected()))?;
                    let hours = expect_number(field, hours)?;
                    check_bounds(field, hours, 0.0, 24.0)?;
                    total += hours;
                }
                if members.len() != 2 {
                    return Err(wrong_shape(field, self.expected()));
                }
                check_bounds(field, total, 0.0, 24.0)
            }
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            CompositeKind::Dimensions => "an object of length/width/height",
            CompositeKind::Pie { .. } => "an object of percentages",
            CompositeKind::Frequency => "an object {count, per}",
            CompositeKind::Photoperiod => "an object {on, off}",
        }
    }
}

/// One entry in the catalog.
#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub label: &'static str,
    pub kind: FieldKind,
    pub unit: Option<&'static str>,
    pub visible_when: Option<Visibility>,
    pub default: Option<Value>,
}

impl FieldDefinition {
    pub fn new(id: &'static str, label: &'static str, kind: FieldKind) -> Self {
        FieldDefinition {
            id: FieldId::new(id),
            label,
            kind,
            unit: None,
            visible_when: None,
            default: None,
        }
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn visible_when(mut self, depends_on: &'static str, when: Predicate) -> Self {
        self.visible_when = Some(Visibility { depends_on, when });
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_computed(&self) -> bool {
        self.kind.is_computed()
    }

    /// Ids this field reads, through its formula or its visibility rule.
    pub fn dependencies(&self) -> Vec<&'static str> {
        let mut deps = Vec::new();
        if let FieldKind::Computed(computation) = &self.kind {
            deps.extend_from_slice(computation.inputs);
        }
        if let Some(visibility) = &self.visible_when {
            if !deps.contains(&visibility.depends_on) {
                deps.push(visibility.depends_on);
            }
        }
        deps
    }
}

fn wrong_shape(field: &FieldId, expected: &'static str) -> ValueError {
    ValueError::WrongShape {
        field: field.to_string(),
        expected,
    }
}

fn expect_text<'v>(field: &FieldId, value: &'v Value) -> Result<&'v str, ValueError> {
    value.as_str().ok_or_else(|| wrong_shape(field, "text"))
}

fn expect_number(field: &FieldId, value: &Value) -> Result<f64, ValueError> {
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(wrong_shape(field, "a number")),
    }
}

fn check_bounds(field: &FieldId, value: f64, min: f64, max: f64) -> Result<(), ValueError> {
    if value < min || value > max {
        return Err(ValueError::OutOfBounds {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_length(field: &FieldId, text: &str, max_len: Option<usize>) -> Result<(), ValueError> {
    match max_len {
        Some(max) if text.chars().count() > max => Err(ValueError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

fn check_option(field: &FieldId, options: &[&str], choice: &str) -> Result<(), ValueError> {
    if options.contains(&choice) {
        Ok(())
    } else {
        Err(ValueError::UnknownOption {
            field: field.to_string(),
            option: choice.to_string(),
        })
    }
}

fn check_option_list(options: &[&str]) -> Result<(), String> {
    if options.is_empty() {
        return Err("option list is empty".to_string());
    }
    for (i, option) in options.iter().enumerate() {
        if options[..i].contains(option) {
            return Err(format!("option `{option}` is listed twice"));
        }
    }
    Ok(())
}
