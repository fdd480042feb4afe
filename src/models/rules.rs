//! Fixed lookup tables: business plausibility bounds, extreme-weather rules
//! and the categorical encodings for cities and sources.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalyticsError, Result};
use crate::models::observation::Metric;

/// Plausibility bounds for one metric, independent of the observed distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRule {
    pub metric: Metric,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
}

/// Indexed by `Metric::index`.
pub const METRIC_RULES: [MetricRule; 6] = [
    MetricRule { metric: Metric::Temperature, min: -50.0, max: 60.0, unit: "°C" },
    MetricRule { metric: Metric::Pressure, min: 800.0, max: 1200.0, unit: "hPa" },
    MetricRule { metric: Metric::Humidity, min: 0.0, max: 100.0, unit: "%" },
    MetricRule { metric: Metric::Precipitation, min: 0.0, max: 500.0, unit: "mm" },
    MetricRule { metric: Metric::WindSpeed, min: 0.0, max: 100.0, unit: "m/s" },
    MetricRule { metric: Metric::WindDirection, min: 0.0, max: 360.0, unit: "°" },
];

impl MetricRule {
    pub fn for_metric(metric: Metric) -> &'static MetricRule {
        &METRIC_RULES[metric.index()]
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Comparison operator used by extreme-event rules and alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Greater => ">",
            Comparison::Less => "<",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "==",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Comparison::Greater),
            "<" => Ok(Comparison::Less),
            ">=" => Ok(Comparison::GreaterOrEqual),
            "<=" => Ok(Comparison::LessOrEqual),
            "==" => Ok(Comparison::Equal),
            other => Err(AnalyticsError::UnknownOperator(other.to_string())),
        }
    }

    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Greater => value > threshold,
            Comparison::Less => value < threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::Equal => value == threshold,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExtremeEventKind {
    #[serde(rename = "high-temp")]
    HighTemperature,
    #[serde(rename = "low-temp")]
    LowTemperature,
    #[serde(rename = "heavy-rain")]
    HeavyRain,
    #[serde(rename = "high-wind")]
    HighWind,
    #[serde(rename = "high-humidity")]
    HighHumidity,
    #[serde(rename = "dryness")]
    Dryness,
}

impl ExtremeEventKind {
    pub fn label(&self) -> &'static str {
        match self {
            ExtremeEventKind::HighTemperature => "high-temp",
            ExtremeEventKind::LowTemperature => "low-temp",
            ExtremeEventKind::HeavyRain => "heavy-rain",
            ExtremeEventKind::HighWind => "high-wind",
            ExtremeEventKind::HighHumidity => "high-humidity",
            ExtremeEventKind::Dryness => "dryness",
        }
    }
}

impl fmt::Display for ExtremeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExtremeRule {
    pub kind: ExtremeEventKind,
    pub metric: Metric,
    pub operator: Comparison,
    pub threshold: f64,
}

pub const EXTREME_RULES: [ExtremeRule; 6] = [
    ExtremeRule {
        kind: ExtremeEventKind::HighTemperature,
        metric: Metric::Temperature,
        operator: Comparison::Greater,
        threshold: 35.0,
    },
    ExtremeRule {
        kind: ExtremeEventKind::LowTemperature,
        metric: Metric::Temperature,
        operator: Comparison::Less,
        threshold: -10.0,
    },
    ExtremeRule {
        kind: ExtremeEventKind::HeavyRain,
        metric: Metric::Precipitation,
        operator: Comparison::Greater,
        threshold: 50.0,
    },
    ExtremeRule {
        kind: ExtremeEventKind::HighWind,
        metric: Metric::WindSpeed,
        operator: Comparison::Greater,
        threshold: 20.0,
    },
    ExtremeRule {
        kind: ExtremeEventKind::HighHumidity,
        metric: Metric::Humidity,
        operator: Comparison::Greater,
        threshold: 95.0,
    },
    ExtremeRule {
        kind: ExtremeEventKind::Dryness,
        metric: Metric::Humidity,
        operator: Comparison::Less,
        threshold: 20.0,
    },
];

impl ExtremeRule {
    pub fn matches(&self, value: f64) -> bool {
        self.operator.evaluate(value, self.threshold)
    }
}

/// Known cities and their fixed identifiers.
pub const CITY_CODES: [(&str, u8); 5] = [
    ("beijing", 1),
    ("shanghai", 2),
    ("guangzhou", 3),
    ("shenzhen", 4),
    ("chengdu", 5),
];

/// Known data sources and their fixed identifiers.
pub const SOURCE_CODES: [(&str, u8); 3] = [("OpenWeatherMap", 1), ("Meteostat", 2), ("Kaggle", 3)];

/// Exact-match lookup; unknown names have no encoding.
pub fn city_code(city: &str) -> Option<u8> {
    CITY_CODES
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, code)| *code)
}

pub fn source_code(source: &str) -> Option<u8> {
    SOURCE_CODES
        .iter()
        .find(|(name, _)| *name == source)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_rules_are_indexed_by_metric() {
        for metric in Metric::ALL {
            assert_eq!(metric.rule().metric, metric);
        }
        assert_eq!(Metric::Humidity.rule().max, 100.0);
        assert!(Metric::Temperature.rule().contains(60.0));
        assert!(!Metric::Temperature.rule().contains(60.1));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(Comparison::Greater.evaluate(36.0, 35.0));
        assert!(!Comparison::Greater.evaluate(35.0, 35.0));
        assert!(Comparison::GreaterOrEqual.evaluate(35.0, 35.0));
        assert!(Comparison::LessOrEqual.evaluate(35.0, 35.0));
        assert!(Comparison::Equal.evaluate(35.0, 35.0));
        assert!(Comparison::Less.evaluate(-11.0, -10.0));
        assert_eq!(Comparison::parse(">=").unwrap(), Comparison::GreaterOrEqual);
        assert!(Comparison::parse("!=").is_err());
    }

    #[test]
    fn test_comparison_serializes_as_symbol() {
        let json = serde_json::to_string(&Comparison::LessOrEqual).unwrap();
        assert_eq!(json, "\"<=\"");
        let parsed: Comparison = serde_json::from_str("\">\"").unwrap();
        assert_eq!(parsed, Comparison::Greater);
    }

    #[test]
    fn test_city_encoding_is_stable() {
        assert_eq!(city_code("beijing"), Some(1));
        assert_eq!(city_code("beijing"), city_code("beijing"));
        assert_eq!(city_code("chengdu"), Some(5));
        assert_eq!(city_code("Beijing"), None);
        assert_eq!(city_code("london"), None);
    }

    #[test]
    fn test_source_encoding() {
        assert_eq!(source_code("Meteostat"), Some(2));
        assert_eq!(source_code("Test"), None);
    }
}
