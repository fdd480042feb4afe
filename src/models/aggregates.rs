use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AnalyticsError, Result};
use crate::models::observation::Metric;

/// Grouping period for the time and regional dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Monthly,
    Seasonal,
}

impl Period {
    pub fn name(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Monthly => "monthly",
            Period::Seasonal => "seasonal",
        }
    }

    /// Bucket a timestamp falls into for this period.
    pub fn bucket(&self, timestamp: NaiveDateTime) -> PeriodKey {
        match self {
            Period::Daily => PeriodKey::Day(timestamp.date()),
            Period::Monthly => PeriodKey::Month {
                year: timestamp.year(),
                month: timestamp.month(),
            },
            Period::Seasonal => PeriodKey::Season(Season::from_month(timestamp.month())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Period {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "monthly" => Ok(Period::Monthly),
            "seasonal" => Ok(Period::Seasonal),
            other => Err(AnalyticsError::UnsupportedPeriod {
                period: other.to_string(),
                analysis: "time analysis".to_string(),
            }),
        }
    }
}

/// Meteorological seasons; declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKey {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    Season(Season),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            PeriodKey::Season(season) => f.write_str(season.name()),
        }
    }
}

/// Summary statistics of one metric within one period bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period: PeriodKey,
    pub count: usize,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    /// Population standard deviation.
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAggregate {
    pub city: String,
    pub metric: Metric,
    pub period: Period,
    pub rows: Vec<PeriodStats>,
}

impl TimeAggregate {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-city means pivoted with one column per city and one row per bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalTable {
    pub metric: Metric,
    pub period: Period,
    /// Column order, sorted by city name.
    pub cities: Vec<String>,
    pub rows: Vec<RegionalRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalRow {
    pub period: PeriodKey,
    /// One cell per entry of `RegionalTable::cities`; `None` when a city has
    /// no data in this bucket.
    pub values: Vec<Option<f64>>,
}

impl RegionalTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, period: &PeriodKey, city: &str) -> Option<f64> {
        let column = self.cities.iter().position(|c| c == city)?;
        self.rows
            .iter()
            .find(|row| &row.period == period)
            .and_then(|row| row.values.get(column).copied().flatten())
    }
}

/// Pearson correlation across the six metrics. Entries are NaN where a column
/// has zero variance or too few paired values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub city: String,
    pub metrics: Vec<Metric>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Metric, b: Metric) -> Option<f64> {
        let i = self.metrics.iter().position(|m| *m == a)?;
        let j = self.metrics.iter().position(|m| *m == b)?;
        Some(self.values[i][j])
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
