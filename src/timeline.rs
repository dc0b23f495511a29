use chrono::{Datelike, Days, Months, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TimelineError;
use crate::field::DATE_FORMAT;

/// Domain variant of the engine. Selects the catalog and interval ceilings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    Culture,
    Curing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalType {
    Hours,
    Days,
    Weeks,
    Months,
    Phases,
}

const CULTURE_INTERVALS: &[(IntervalType, usize)] = &[
    (IntervalType::Days, 365),
    (IntervalType::Weeks, 52),
    (IntervalType::Phases, 12),
];

const CURING_INTERVALS: &[(IntervalType, usize)] = &[
    (IntervalType::Hours, 720),
    (IntervalType::Days, 365),
    (IntervalType::Weeks, 52),
    (IntervalType::Months, 24),
];

const CULTURE_PHASES: &[(&str, &str, u32)] = &[
    ("seed", "Seed", 1),
    ("germination", "Germination", 3),
    ("seedling", "Seedling", 7),
    ("veg-early", "Early vegetative", 14),
    ("veg-mid", "Mid vegetative", 14),
    ("veg-late", "Late vegetative", 7),
    ("stretch-early", "Early stretch", 7),
    ("stretch-mid", "Mid stretch", 7),
    ("stretch-late", "Late stretch", 7),
    ("flower-early", "Early flowering", 14),
    ("flower-mid", "Mid flowering", 14),
    ("flower-late", "Late flowering", 14),
];

impl PipelineType {
    pub const ALL: [PipelineType; 2] = [PipelineType::Culture, PipelineType::Curing];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Culture => "culture",
            PipelineType::Curing => "curing",
        }
    }

    /// Interval types this pipeline offers, with their cell ceilings.
    pub fn intervals(&self) -> &'static [(IntervalType, usize)] {
        match self {
            PipelineType::Culture => CULTURE_INTERVALS,
            PipelineType::Curing => CURING_INTERVALS,
        }
    }

    pub fn ceiling(&self, interval: IntervalType) -> Option<usize> {
        self.intervals()
            .iter()
            .find(|(offered, _)| *offered == interval)
            .map(|&(_, ceiling)| ceiling)
    }

    pub fn offers(&self, interval: IntervalType) -> bool {
        self.ceiling(interval).is_some()
    }

    pub fn default_phases(&self) -> Vec<Phase> {
        match self {
            PipelineType::Culture => CULTURE_PHASES
                .iter()
                .map(|&(id, name, days)| Phase::new(id, name, days))
                .collect(),
            PipelineType::Curing => Vec::new(),
        }
    }

    pub fn default_config(&self) -> TimelineConfig {
        let duration = match self {
            PipelineType::Culture => 90,
            PipelineType::Curing => 14,
        };
        let mut config = TimelineConfig {
            interval_type: IntervalType::Days,
            start: None,
            end: None,
            duration: Some(duration),
            total_cells: 0,
            phases: self.default_phases(),
        };
        config.total_cells = derive_total(*self, &config).unwrap_or(duration as usize);
        config
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineType {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "culture" => Ok(PipelineType::Culture),
            "curing" => Ok(PipelineType::Curing),
            _ => Err(TimelineError::UnknownPipeline(s.to_string())),
        }
    }
}

impl IntervalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalType::Hours => "hours",
            IntervalType::Days => "days",
            IntervalType::Weeks => "weeks",
            IntervalType::Months => "months",
            IntervalType::Phases => "phases",
        }
    }

    /// Word used in ordinal labels, e.g. `Day 3`.
    pub fn unit_label(&self) -> &'static str {
        match self {
            IntervalType::Hours => "Hour",
            IntervalType::Days => "Day",
            IntervalType::Weeks => "Week",
            IntervalType::Months => "Month",
            IntervalType::Phases => "Phase",
        }
    }
}

impl fmt::Display for IntervalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalType {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hours" | "hour" => Ok(IntervalType::Hours),
            "days" | "day" => Ok(IntervalType::Days),
            "weeks" | "week" => Ok(IntervalType::Weeks),
            "months" | "month" => Ok(IntervalType::Months),
            "phases" | "phase" => Ok(IntervalType::Phases),
            _ => Err(TimelineError::UnknownInterval(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub duration_days: u32,
}

impl Phase {
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration_days: u32) -> Self {
        Phase {
            id: id.into(),
            name: name.into(),
            duration_days,
        }
    }
}

/// Shape of the timeline. `total_cells` is derived and always within
/// `1..=ceiling` for the active interval type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineConfig {
    pub interval_type: IntervalType,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub duration: Option<u32>,
    pub total_cells: usize,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

/// Partial update merged by [`Timeline::configure`]. `None` leaves a setting
/// alone; `Some(None)` clears an optional one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelineUpdate {
    pub interval_type: Option<IntervalType>,
    pub start: Option<Option<NaiveDate>>,
    pub end: Option<Option<NaiveDate>>,
    pub duration: Option<Option<u32>>,
    pub phases: Option<Vec<Phase>>,
}

impl TimelineUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: IntervalType) -> Self {
        self.interval_type = Some(interval);
        self
    }

    pub fn start(mut self, date: NaiveDate) -> Self {
        self.start = Some(Some(date));
        self
    }

    pub fn end(mut self, date: NaiveDate) -> Self {
        self.end = Some(Some(date));
        self
    }

    pub fn clear_dates(mut self) -> Self {
        self.start = Some(None);
        self.end = Some(None);
        self
    }

    pub fn duration(mut self, units: u32) -> Self {
        self.duration = Some(Some(units));
        self
    }

    pub fn clear_duration(mut self) -> Self {
        self.duration = Some(None);
        self
    }

    pub fn phases(mut self, phases: Vec<Phase>) -> Self {
        self.phases = Some(phases);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    pipeline: PipelineType,
    config: TimelineConfig,
}

impl Timeline {
    pub fn new(pipeline: PipelineType) -> Self {
        Timeline {
            pipeline,
            config: pipeline.default_config(),
        }
    }

    /// Adopt a stored configuration. `total_cells` is recomputed rather than
    /// trusted.
    pub fn with_config(
        pipeline: PipelineType,
        mut config: TimelineConfig,
    ) -> Result<Self, TimelineError> {
        config.total_cells = derive_total(pipeline, &config)?;
        Ok(Timeline { pipeline, config })
    }

    pub fn pipeline(&self) -> PipelineType {
        self.pipeline
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Merge `update` into the configuration and recompute the cell count.
    ///
    /// The update is applied atomically: on error the timeline is unchanged.
    /// Switching interval type drops the previous `duration`, which was
    /// counted in the old unit, unless the update supplies a new one.
    pub fn configure(&mut self, update: TimelineUpdate) -> Result<&TimelineConfig, TimelineError> {
        let mut next = self.config.clone();

        if let Some(interval) = update.interval_type {
            if !self.pipeline.offers(interval) {
                return Err(TimelineError::UnsupportedInterval {
                    pipeline: self.pipeline,
                    interval,
                });
            }
            if interval != next.interval_type {
                next.duration = None;
            }
            next.interval_type = interval;
        }
        if let Some(start) = update.start {
            next.start = start;
        }
        if let Some(end) = update.end {
            next.end = end;
        }
        if let Some(duration) = update.duration {
            next.duration = duration;
        }
        if let Some(phases) = update.phases {
            next.phases = phases;
        }

        next.total_cells = derive_total(self.pipeline, &next)?;
        log::debug!(
            "timeline reconfigured: {} x {} (was {} x {})",
            next.total_cells,
            next.interval_type,
            self.config.total_cells,
            self.config.interval_type
        );
        self.config = next;
        Ok(&self.config)
    }

    pub fn cell_count(&self) -> usize {
        self.config.total_cells
    }

    pub fn check_index(&self, index: usize) -> Result<(), TimelineError> {
        if index >= self.config.total_cells {
            return Err(TimelineError::CellOutOfRange {
                index,
                count: self.config.total_cells,
            });
        }
        Ok(())
    }

    /// Display label of cell `index`.
    ///
    /// Phases use the phase name (`Phase n` past the end of the list). Other
    /// intervals render a calendar position when a start date is set and an
    /// ordinal such as `Week 3` otherwise.
    pub fn label_for(&self, index: usize) -> Result<String, TimelineError> {
        self.check_index(index)?;
        let interval = self.config.interval_type;
        let ordinal = || format!("{} {}", interval.unit_label(), index + 1);

        if interval == IntervalType::Phases {
            return Ok(self
                .config
                .phases
                .get(index)
                .map(|phase| phase.name.clone())
                .unwrap_or_else(ordinal));
        }
        Ok(self
            .config
            .start
            .and_then(|start| calendar_label(interval, start, index))
            .unwrap_or_else(ordinal))
    }
}

fn calendar_label(interval: IntervalType, start: NaiveDate, index: usize) -> Option<String> {
    let offset = index as u64;
    match interval {
        IntervalType::Days => start
            .checked_add_days(Days::new(offset))
            .map(|d| d.format(DATE_FORMAT).to_string()),
        IntervalType::Weeks => start
            .checked_add_days(Days::new(offset * 7))
            .map(|d| d.format(DATE_FORMAT).to_string()),
        IntervalType::Hours => start
            .and_hms_opt(0, 0, 0)
            .and_then(|t| t.checked_add_signed(TimeDelta::try_hours(index as i64)?))
            .map(|t| t.format("%Y-%m-%d %H:00").to_string()),
        IntervalType::Months => start
            .checked_add_months(Months::new(u32::try_from(index).ok()?))
            .map(|d| d.format("%Y-%m").to_string()),
        IntervalType::Phases => None,
    }
}

/// Cell count for `config` under `pipeline`, clamped to `1..=ceiling`.
///
/// Both dates win over `duration`; phases count the phase list instead of
/// dates. Without either, the ceiling applies.
fn derive_total(pipeline: PipelineType, config: &TimelineConfig) -> Result<usize, TimelineError> {
    let interval = config.interval_type;
    let ceiling = pipeline
        .ceiling(interval)
        .ok_or(TimelineError::UnsupportedInterval { pipeline, interval })?;

    if let (Some(start), Some(end)) = (config.start, config.end) {
        if start > end {
            return Err(TimelineError::InvertedRange { start, end });
        }
    }
    if config.duration == Some(0) {
        return Err(TimelineError::ZeroDuration);
    }

    let from_dates = match (config.start, config.end) {
        (Some(start), Some(end)) if interval != IntervalType::Phases => {
            Some(span_in(interval, start, end))
        }
        _ => None,
    };
    let raw = from_dates
        .or(config.duration.map(|d| d as usize))
        .or_else(|| {
            (interval == IntervalType::Phases && !config.phases.is_empty())
                .then_some(config.phases.len())
        })
        .unwrap_or(ceiling);

    Ok(raw.clamp(1, ceiling))
}

fn span_in(interval: IntervalType, start: NaiveDate, end: NaiveDate) -> usize {
    let days = (end - start).num_days().max(0) as usize + 1;
    match interval {
        IntervalType::Hours => days * 24,
        IntervalType::Days => days,
        IntervalType::Weeks => days.div_ceil(7),
        IntervalType::Months => {
            let months = (end.year() - start.year()) * 12 + end.month() as i32
                - start.month() as i32;
            months.max(0) as usize + 1
        }
        IntervalType::Phases => days,
    }
}
