use chrono::NaiveDate;
use thiserror::Error;

use crate::timeline::{IntervalType, PipelineType};

/// Catalog authoring mistakes. These are detected when a catalog is loaded and
/// must stop initialisation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("duplicate field id `{0}`")]
    DuplicateField(String),
    #[error("duplicate field label `{0}`")]
    DuplicateLabel(String),
    #[error("invalid field id `{0}`")]
    InvalidFieldId(String),
    #[error("field `{field}` references unknown field `{reference}`")]
    UnknownReference { field: String, reference: String },
    #[error("computation cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("field `{field}` has malformed constraints: {reason}")]
    MalformedConstraints { field: String, reason: String },
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::DuplicateField(_) => "duplicate_field",
            CatalogError::DuplicateLabel(_) => "duplicate_label",
            CatalogError::InvalidFieldId(_) => "invalid_field_id",
            CatalogError::UnknownReference { .. } => "unknown_reference",
            CatalogError::Cycle(_) => "cyclic_dependency",
            CatalogError::MalformedConstraints { .. } => "malformed_constraints",
        }
    }
}

/// Caller errors against the timeline: the engine rejects these instead of
/// coercing to a nearby valid value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("cell {index} is outside the timeline (0..{count})")]
    CellOutOfRange { index: usize, count: usize },
    #[error("interval `{interval}` is not offered by the {pipeline} pipeline")]
    UnsupportedInterval {
        pipeline: PipelineType,
        interval: IntervalType,
    },
    #[error("unknown interval type `{0}`")]
    UnknownInterval(String),
    #[error("unknown pipeline type `{0}`")]
    UnknownPipeline(String),
    #[error("end date {end} is before start date {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("duration must be at least one interval")]
    ZeroDuration,
}

impl TimelineError {
    pub fn code(&self) -> &'static str {
        match self {
            TimelineError::CellOutOfRange { .. } => "cell_out_of_range",
            TimelineError::UnsupportedInterval { .. } => "unsupported_interval",
            TimelineError::UnknownInterval(_) => "unknown_interval",
            TimelineError::UnknownPipeline(_) => "unknown_pipeline",
            TimelineError::InvertedRange { .. } => "inverted_range",
            TimelineError::ZeroDuration => "zero_duration",
        }
    }
}

/// A value that cannot be stored against a field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is computed and cannot be edited")]
    Computed(String),
    #[error("field `{field}` expects {expected}")]
    WrongShape {
        field: String,
        expected: &'static str,
    },
    #[error("field `{field}` value {value} is outside {min}..={max}")]
    OutOfBounds {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("field `{field}` does not offer option `{option}`")]
    UnknownOption { field: String, option: String },
    #[error("field `{field}` exceeds {max} characters")]
    TooLong { field: String, max: usize },
}

impl ValueError {
    pub fn code(&self) -> &'static str {
        match self {
            ValueError::UnknownField(_) => "unknown_field",
            ValueError::Computed(_) => "computed_field",
            ValueError::WrongShape { .. } => "wrong_shape",
            ValueError::OutOfBounds { .. } => "out_of_bounds",
            ValueError::UnknownOption { .. } => "unknown_option",
            ValueError::TooLong { .. } => "too_long",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl CellError {
    pub fn code(&self) -> &'static str {
        match self {
            CellError::Timeline(e) => e.code(),
            CellError::Value(e) => e.code(),
        }
    }
}

/// Preset failures. Only `DuplicateName` carries a message meant for end users.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PresetError {
    #[error("a preset named \"{name}\" already exists in group \"{group}\"")]
    DuplicateName { name: String, group: String },
    #[error("preset name cannot be empty")]
    EmptyName,
    #[error("no data to capture from the selected fields")]
    NoData,
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
}

impl PresetError {
    pub fn code(&self) -> &'static str {
        match self {
            PresetError::DuplicateName { .. } => "duplicate_name",
            PresetError::EmptyName => "empty_name",
            PresetError::NoData => "no_data",
            PresetError::UnknownPreset(_) => "unknown_preset",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PresetError::DuplicateName { name, group } => format!(
                "A preset called \"{name}\" already exists in \"{group}\". Pick another name or edit the existing preset."
            ),
            PresetError::EmptyName => "Give the preset a name before saving it.".to_string(),
            PresetError::NoData => "The selected fields hold no data to save.".to_string(),
            PresetError::UnknownPreset(_) => "The preset could not be saved.".to_string(),
        }
    }
}

/// Failures of the external key-value store. Never fatal to the engine.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("value stored under `{key}` is not valid JSON: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("input is empty")]
    Empty,
    #[error("header must start with `Cell,Period`")]
    MissingHeader,
    #[error("column `{0}` does not match any catalog field")]
    UnknownColumn(String),
    #[error("row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
    #[error("document belongs to the {found} pipeline, expected {expected}")]
    PipelineMismatch {
        expected: PipelineType,
        found: PipelineType,
    },
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error("document I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

impl From<ValueError> for PipelineError {
    fn from(e: ValueError) -> Self {
        PipelineError::Cell(CellError::Value(e))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("unknown option `{0}`")]
    UnknownFlag(String),
    #[error("option `{0}` needs a value")]
    MissingValue(String),
    #[error(transparent)]
    Pipeline(#[from] TimelineError),
}
