use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AnalyticsError, Result};
use crate::models::observation::{Metric, Observation, ObservationRow};

/// Declared kind of a batch; selects the missing-value remediation default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Realtime,
    #[default]
    Historical,
    Extreme,
}

impl DataKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::Realtime => "realtime",
            DataKind::Historical => "historical",
            DataKind::Extreme => "extreme",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "realtime" => Ok(DataKind::Realtime),
            "historical" => Ok(DataKind::Historical),
            "extreme" => Ok(DataKind::Extreme),
            other => Err(AnalyticsError::InvalidFormat(format!(
                "Unknown data kind '{}' (expected realtime, historical or extreme)",
                other
            ))),
        }
    }
}

/// Calendar components derived from an observation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl From<NaiveDateTime> for TimeParts {
    fn from(ts: NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
            minute: ts.minute(),
            second: ts.second(),
        }
    }
}

/// An observation with the columns the quality pipeline derives for it.
///
/// `normalized` and `standardized` are indexed by `Metric::index`. A slot is
/// only meaningful for metrics listed in the owning batch's
/// `normalized_metrics` / `standardized_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub observation: Observation,
    pub time: TimeParts,
    pub city_id: Option<u8>,
    pub source_id: Option<u8>,
    pub normalized: [Option<f64>; 6],
    pub standardized: [Option<f64>; 6],
}

impl CleanedRecord {
    pub fn new(observation: Observation) -> Self {
        let time = TimeParts::from(observation.timestamp);
        Self {
            observation,
            time,
            city_id: None,
            source_id: None,
            normalized: [None; 6],
            standardized: [None; 6],
        }
    }

    pub fn normalized_value(&self, metric: Metric) -> Option<f64> {
        self.normalized[metric.index()]
    }

    pub fn standardized_value(&self, metric: Metric) -> Option<f64> {
        self.standardized[metric.index()]
    }
}

impl ObservationRow for CleanedRecord {
    fn observation(&self) -> &Observation {
        &self.observation
    }

    fn observation_mut(&mut self) -> &mut Observation {
        &mut self.observation
    }
}

/// Output of the full quality pipeline for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedBatch {
    pub city: String,
    pub kind: DataKind,
    pub records: Vec<CleanedRecord>,
    /// Metrics for which a min-max column exists (non-constant columns).
    pub normalized_metrics: Vec<Metric>,
    /// Metrics for which a z-score column exists (positive std).
    pub standardized_metrics: Vec<Metric>,
}

impl CleanedBatch {
    pub fn empty(city: impl Into<String>, kind: DataKind) -> Self {
        Self {
            city: city.into(),
            kind,
            records: Vec::new(),
            normalized_metrics: Vec::new(),
            standardized_metrics: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.records.iter().map(|r| &r.observation)
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.records.into_iter().map(|r| r.observation).collect()
    }
}
