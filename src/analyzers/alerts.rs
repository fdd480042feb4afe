use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::AlertConfig;
use crate::models::{AlertRecord, AlertRule, AlertSeverity, Metric, ObservationRow};
use crate::utils::constants::{
    DEFAULT_ALERT_WINDOW_HOURS, DEFAULT_HIGH_SEVERITY_RATIO, MAX_ALERT_WINDOW_HOURS,
};

/// Evaluates threshold rules against the latest observation of a city.
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    window: Duration,
    high_severity_ratio: f64,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self {
            window: Duration::hours(DEFAULT_ALERT_WINDOW_HOURS),
            high_severity_ratio: DEFAULT_HIGH_SEVERITY_RATIO,
        }
    }

    /// The window is clamped to `1..=MAX_ALERT_WINDOW_HOURS` hours.
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            window: Duration::hours(config.window_hours.clamp(1, MAX_ALERT_WINDOW_HOURS)),
            high_severity_ratio: config.high_severity_ratio,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Severity is high when the deviation exceeds `ratio * threshold`.
    /// A threshold of 0 makes any non-zero deviation high.
    pub fn severity(&self, value: f64, threshold: f64) -> AlertSeverity {
        if (value - threshold).abs() > threshold * self.high_severity_ratio {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        }
    }

    /// Check `rules` against the single most recent observation of `city`
    /// within the trailing window ending at `now`. Metrics missing from that
    /// observation are skipped.
    pub fn evaluate<R: ObservationRow>(
        &self,
        rows: &[R],
        city: &str,
        rules: &BTreeMap<Metric, AlertRule>,
        now: NaiveDateTime,
    ) -> Vec<AlertRecord> {
        let window_start = now
            .checked_sub_signed(self.window)
            .unwrap_or(NaiveDateTime::MIN);
        let latest = rows
            .iter()
            .map(|r| r.observation())
            .filter(|o| o.city == city && o.timestamp >= window_start && o.timestamp <= now)
            .max_by_key(|o| o.timestamp);

        let Some(latest) = latest else {
            debug!(city, "No observations in alert window");
            return Vec::new();
        };

        rules
            .iter()
            .filter_map(|(&metric, rule)| {
                let value = latest.value(metric)?;
                if !rule.operator.evaluate(value, rule.threshold) {
                    return None;
                }
                Some(AlertRecord {
                    city: city.to_string(),
                    metric,
                    value,
                    threshold: rule.threshold,
                    operator: rule.operator,
                    time: latest.timestamp,
                    severity: self.severity(value, rule.threshold),
                })
            })
            .collect()
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comparison, Observation};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 20)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn reading(hours_ago: i64, temperature: Option<f64>) -> Observation {
        let mut obs = Observation::new("shenzhen", now() - Duration::hours(hours_ago), "OpenWeatherMap");
        obs.temperature = temperature;
        obs
    }

    fn heat_rule() -> BTreeMap<Metric, AlertRule> {
        BTreeMap::from([(Metric::Temperature, AlertRule::new(Comparison::Greater, 35.0))])
    }

    #[test]
    fn test_severity_levels() {
        let evaluator = AlertEvaluator::new();
        let check = |value| evaluator.evaluate(&[reading(1, Some(value))], "shenzhen", &heat_rule(), now());

        let medium = check(36.0);
        assert_eq!(medium.len(), 1);
        assert_eq!(medium[0].severity, AlertSeverity::Medium);

        let high = check(40.0);
        assert_eq!(high[0].severity, AlertSeverity::High);

        assert!(check(30.0).is_empty());
    }

    #[test]
    fn test_only_latest_reading_counts() {
        // An earlier reading would trigger, the latest one does not
        let rows = vec![reading(5, Some(41.0)), reading(1, Some(20.0))];
        let alerts = AlertEvaluator::new().evaluate(&rows, "shenzhen", &heat_rule(), now());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_readings_outside_window_are_ignored() {
        let rows = vec![reading(30, Some(45.0))];
        let alerts = AlertEvaluator::new().evaluate(&rows, "shenzhen", &heat_rule(), now());
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_missing_metric_is_skipped() {
        let mut rules = heat_rule();
        rules.insert(Metric::Humidity, AlertRule::new(Comparison::GreaterOrEqual, 90.0));
        let rows = vec![reading(2, Some(37.0))];

        let alerts = AlertEvaluator::new().evaluate(&rows, "shenzhen", &rules, now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, Metric::Temperature);
        assert_eq!(alerts[0].time, now() - Duration::hours(2));
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let config = AlertConfig {
            window_hours: i64::MAX,
            ..AlertConfig::default()
        };
        let evaluator = AlertEvaluator::from_config(&config);
        assert_eq!(evaluator.window(), Duration::hours(MAX_ALERT_WINDOW_HOURS));

        let alerts = evaluator.evaluate(&[reading(30, Some(45.0))], "shenzhen", &heat_rule(), now());
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_window_start_before_min_time() {
        let earliest = NaiveDateTime::MIN + Duration::hours(1);
        let mut obs = Observation::new("shenzhen", earliest, "OpenWeatherMap");
        obs.temperature = Some(38.0);

        let alerts = AlertEvaluator::new().evaluate(&[obs], "shenzhen", &heat_rule(), earliest);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_zero_threshold_is_always_high() {
        let evaluator = AlertEvaluator::new();
        assert_eq!(evaluator.severity(0.5, 0.0), AlertSeverity::High);
        assert_eq!(evaluator.severity(0.0, 0.0), AlertSeverity::Medium);
    }
}
