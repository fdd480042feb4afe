use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::observation::{Metric, Observation};
use crate::models::rules::{Comparison, ExtremeEventKind};

/// Values of all six metrics at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
}

impl From<&Observation> for MetricSnapshot {
    fn from(obs: &Observation) -> Self {
        Self {
            temperature: obs.temperature,
            pressure: obs.pressure,
            humidity: obs.humidity,
            precipitation: obs.precipitation,
            wind_speed: obs.wind_speed,
            wind_direction: obs.wind_direction,
        }
    }
}

/// A detected extreme-weather rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeEventRecord {
    pub event_type: ExtremeEventKind,
    pub city: String,
    pub timestamp: NaiveDateTime,
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub operator: Comparison,
    pub snapshot: MetricSnapshot,
}

impl fmt::Display for ExtremeEventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} - {}: {} {} {}",
            self.event_type, self.timestamp, self.metric, self.value, self.operator, self.threshold
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Outcome of one forecast call: points ordered by date or a failure message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ForecastResult {
    Success {
        city: String,
        metric: Metric,
        forecast_days: usize,
        forecast_data: Vec<ForecastPoint>,
        model_summary: String,
    },
    Failure {
        message: String,
    },
}

impl ForecastResult {
    pub fn failure(message: impl Into<String>) -> Self {
        ForecastResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ForecastResult::Success { .. })
    }

    pub fn points(&self) -> &[ForecastPoint] {
        match self {
            ForecastResult::Success { forecast_data, .. } => forecast_data,
            ForecastResult::Failure { .. } => &[],
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ForecastResult::Success { .. } => None,
            ForecastResult::Failure { message } => Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
        }
    }
}

/// Threshold rule for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub operator: Comparison,
    pub threshold: f64,
}

impl AlertRule {
    pub fn new(operator: Comparison, threshold: f64) -> Self {
        Self { operator, threshold }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub city: String,
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub operator: Comparison,
    pub time: NaiveDateTime,
    pub severity: AlertSeverity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_failure_accessors() {
        let result = ForecastResult::failure("Insufficient data");
        assert!(!result.is_success());
        assert!(result.points().is_empty());
        assert_eq!(result.message(), Some("Insufficient data"));
    }

    #[test]
    fn test_forecast_result_serializes_with_status_tag() {
        let json = serde_json::to_value(ForecastResult::failure("boom")).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn test_alert_rules_deserialize_from_json() {
        let rule: AlertRule =
            serde_json::from_str(r#"{"operator": ">", "threshold": 35}"#).unwrap();
        assert_eq!(rule, AlertRule::new(Comparison::Greater, 35.0));
    }
}
