use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{AnalyticsError, Result};
use crate::models::rules::MetricRule;

/// The six numeric weather metrics carried by every observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Pressure,
    Humidity,
    Precipitation,
    WindSpeed,
    WindDirection,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Temperature,
        Metric::Pressure,
        Metric::Humidity,
        Metric::Precipitation,
        Metric::WindSpeed,
        Metric::WindDirection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Pressure => "pressure",
            Metric::Humidity => "humidity",
            Metric::Precipitation => "precipitation",
            Metric::WindSpeed => "wind_speed",
            Metric::WindDirection => "wind_direction",
        }
    }

    /// Position of the metric in fixed-size per-metric arrays.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn parse(s: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| AnalyticsError::UnknownMetric(s.to_string()))
    }

    /// Business plausibility bounds for this metric.
    pub fn rule(&self) -> &'static MetricRule {
        MetricRule::for_metric(*self)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    #[default]
    Valid,
    Invalid,
}

/// One timestamped reading for a city from a given source. Metrics are
/// nullable until the quality pipeline has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Observation {
    #[validate(length(min = 1))]
    pub city: String,
    pub timestamp: NaiveDateTime,

    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,

    #[validate(length(min = 1))]
    pub source: String,
    #[serde(default)]
    pub status: ObservationStatus,
}

impl Observation {
    /// Create an observation with every metric missing.
    pub fn new(city: impl Into<String>, timestamp: NaiveDateTime, source: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            timestamp,
            temperature: None,
            pressure: None,
            humidity: None,
            precipitation: None,
            wind_speed: None,
            wind_direction: None,
            source: source.into(),
            status: ObservationStatus::Valid,
        }
    }

    pub fn builder() -> ObservationBuilder {
        ObservationBuilder::new()
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Pressure => self.pressure,
            Metric::Humidity => self.humidity,
            Metric::Precipitation => self.precipitation,
            Metric::WindSpeed => self.wind_speed,
            Metric::WindDirection => self.wind_direction,
        }
    }

    pub fn set_value(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Temperature => &mut self.temperature,
            Metric::Pressure => &mut self.pressure,
            Metric::Humidity => &mut self.humidity,
            Metric::Precipitation => &mut self.precipitation,
            Metric::WindSpeed => &mut self.wind_speed,
            Metric::WindDirection => &mut self.wind_direction,
        };
        // NaN never survives into the series; it is the same as missing
        *slot = value.filter(|v| !v.is_nan());
    }

    /// All six metric values in `Metric::ALL` order.
    pub fn values(&self) -> [Option<f64>; 6] {
        Metric::ALL.map(|m| self.value(m))
    }

    pub fn missing_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.value(*m).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        Metric::ALL.iter().all(|m| self.value(*m).is_some())
    }
}

/// Row types the quality processor and analyzers can operate on.
pub trait ObservationRow: Clone {
    fn observation(&self) -> &Observation;
    fn observation_mut(&mut self) -> &mut Observation;
}

impl ObservationRow for Observation {
    fn observation(&self) -> &Observation {
        self
    }

    fn observation_mut(&mut self) -> &mut Observation {
        self
    }
}

/// Inclusive time window used when fetching observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }
}

#[derive(Default)]
pub struct ObservationBuilder {
    city: Option<String>,
    timestamp: Option<NaiveDateTime>,
    source: Option<String>,
    values: [Option<f64>; 6],
    status: ObservationStatus,
}

impl ObservationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn metric(mut self, metric: Metric, value: f64) -> Self {
        self.values[metric.index()] = Some(value);
        self
    }

    pub fn temperature(self, value: f64) -> Self {
        self.metric(Metric::Temperature, value)
    }

    pub fn pressure(self, value: f64) -> Self {
        self.metric(Metric::Pressure, value)
    }

    pub fn humidity(self, value: f64) -> Self {
        self.metric(Metric::Humidity, value)
    }

    pub fn precipitation(self, value: f64) -> Self {
        self.metric(Metric::Precipitation, value)
    }

    pub fn wind_speed(self, value: f64) -> Self {
        self.metric(Metric::WindSpeed, value)
    }

    pub fn wind_direction(self, value: f64) -> Self {
        self.metric(Metric::WindDirection, value)
    }

    pub fn status(mut self, status: ObservationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Result<Observation> {
        let mut missing = Vec::new();
        if self.city.is_none() {
            missing.push("city".to_string());
        }
        if self.timestamp.is_none() {
            missing.push("timestamp".to_string());
        }
        if self.source.is_none() {
            missing.push("source".to_string());
        }

        let (Some(city), Some(timestamp), Some(source)) = (self.city, self.timestamp, self.source)
        else {
            return Err(AnalyticsError::MissingField(missing));
        };

        let mut observation = Observation::new(city, timestamp, source);
        for metric in Metric::ALL {
            observation.set_value(metric, self.values[metric.index()]);
        }
        observation.status = self.status;

        observation.validate()?;
        Ok(observation)
    }
}
