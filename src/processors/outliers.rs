use serde::Serialize;

use crate::config::QualityConfig;
use crate::models::{Metric, ObservationRow};
use crate::utils::constants::{DEFAULT_IQR_MULTIPLIER, DEFAULT_ZSCORE_THRESHOLD};
use crate::utils::stats;

/// Tukey fences computed from the quartiles of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Values exactly on a fence are not outliers.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IqrDetection {
    /// Row positions flagged, ascending.
    pub indices: Vec<usize>,
    /// `None` when the column has no values.
    pub bounds: Option<OutlierBounds>,
}

/// Statistical and rule-based outlier detectors for a single metric column.
/// Missing values are never flagged.
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    iqr_multiplier: f64,
    zscore_threshold: f64,
}

impl OutlierDetector {
    pub fn new() -> Self {
        Self {
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            zscore_threshold: DEFAULT_ZSCORE_THRESHOLD,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            iqr_multiplier: config.iqr_multiplier,
            zscore_threshold: config.zscore_threshold,
        }
    }

    pub fn with_zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = threshold;
        self
    }

    pub fn iqr_bounds<R: ObservationRow>(&self, rows: &[R], metric: Metric) -> Option<OutlierBounds> {
        let values = stats::column_values(rows, metric);
        let (q1, q3) = stats::quartiles(&values)?;
        let iqr = q3 - q1;
        Some(OutlierBounds {
            q1,
            q3,
            lower: q1 - self.iqr_multiplier * iqr,
            upper: q3 + self.iqr_multiplier * iqr,
        })
    }

    /// Rows outside `[Q1 - k·IQR, Q3 + k·IQR]`.
    pub fn detect_iqr<R: ObservationRow>(&self, rows: &[R], metric: Metric) -> IqrDetection {
        let Some(bounds) = self.iqr_bounds(rows, metric) else {
            return IqrDetection {
                indices: Vec::new(),
                bounds: None,
            };
        };

        let indices = flag(rows, metric, |v| bounds.is_outlier(v));
        IqrDetection {
            indices,
            bounds: Some(bounds),
        }
    }

    /// Rows whose sample z-score magnitude exceeds the threshold. A column
    /// with fewer than two values or zero spread yields nothing.
    pub fn detect_zscore<R: ObservationRow>(&self, rows: &[R], metric: Metric) -> Vec<usize> {
        let values = stats::column_values(rows, metric);
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::sample_std(&values)) else {
            return Vec::new();
        };
        if std == 0.0 {
            return Vec::new();
        }

        let threshold = self.zscore_threshold;
        flag(rows, metric, |v| ((v - mean) / std).abs() > threshold)
    }

    /// Rows outside the fixed plausibility bounds of the metric.
    pub fn detect_business<R: ObservationRow>(&self, rows: &[R], metric: Metric) -> Vec<usize> {
        let rule = metric.rule();
        flag(rows, metric, |v| !rule.contains(v))
    }

    /// Union of IQR and business-rule detections, deduplicated and ascending.
    /// The z-score detector is deliberately not part of this set.
    pub fn detect_combined<R: ObservationRow>(&self, rows: &[R], metric: Metric) -> Vec<usize> {
        let mut indices = self.detect_iqr(rows, metric).indices;
        indices.extend(self.detect_business(rows, metric));
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn flag<R, F>(rows: &[R], metric: Metric, is_outlier: F) -> Vec<usize>
where
    R: ObservationRow,
    F: Fn(f64) -> bool,
{
    rows.iter()
        .enumerate()
        .filter_map(|(i, r)| {
            r.observation()
                .value(metric)
                .filter(|v| is_outlier(*v))
                .map(|_| i)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;
    use chrono::{Duration, NaiveDate};

    fn series(metric: Metric, values: &[Option<f64>]) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut obs = Observation::new("beijing", start + Duration::hours(i as i64), "Meteostat");
                obs.set_value(metric, *v);
                obs
            })
            .collect()
    }

    #[test]
    fn test_iqr_bounds_formula() {
        let rows = series(Metric::Temperature, &[1.0, 2.0, 3.0, 4.0, 5.0].map(Some));
        let bounds = OutlierDetector::new()
            .iqr_bounds(&rows, Metric::Temperature)
            .unwrap();

        assert_eq!(bounds.q1, 2.0);
        assert_eq!(bounds.q3, 4.0);
        assert_eq!(bounds.lower, 2.0 - 1.5 * 2.0);
        assert_eq!(bounds.upper, 4.0 + 1.5 * 2.0);
    }

    #[test]
    fn test_value_on_fence_is_not_flagged() {
        // Q1 = 2, Q3 = 4, fences at -1 and 7
        let rows = series(
            Metric::Temperature,
            &[2.0, 2.0, 3.0, 4.0, 4.0, 7.0, -1.0].map(Some),
        );
        let detection = OutlierDetector::new().detect_iqr(&rows, Metric::Temperature);
        let bounds = detection.bounds.unwrap();
        assert_eq!((bounds.lower, bounds.upper), (-1.0, 7.0));
        assert!(detection.indices.is_empty());

        let rows = series(
            Metric::Temperature,
            &[2.0, 2.0, 3.0, 4.0, 4.0, 7.5, -1.5].map(Some),
        );
        let detection = OutlierDetector::new().detect_iqr(&rows, Metric::Temperature);
        assert_eq!(detection.indices, vec![5, 6]);
    }

    #[test]
    fn test_iqr_flags_spike() {
        let mut values: Vec<Option<f64>> = (0..100)
            .map(|i| Some(20.0 + ((i % 7) as f64 - 3.0) * 0.1))
            .collect();
        values[10] = Some(100.0);
        let rows = series(Metric::Temperature, &values);

        let detection = OutlierDetector::new().detect_iqr(&rows, Metric::Temperature);
        assert!(detection.indices.contains(&10));
    }

    #[test]
    fn test_missing_values_are_not_flagged() {
        let rows = series(Metric::Pressure, &[Some(1000.0), None, Some(1001.0), Some(2000.0)]);
        let detector = OutlierDetector::new();
        assert!(!detector.detect_iqr(&rows, Metric::Pressure).indices.contains(&1));
        assert_eq!(detector.detect_business(&rows, Metric::Pressure), vec![3]);
    }

    #[test]
    fn test_zscore_detection() {
        let mut values: Vec<Option<f64>> = (0..50).map(|i| Some((i % 5) as f64)).collect();
        values.push(Some(100.0));
        let rows = series(Metric::Humidity, &values);

        let detector = OutlierDetector::new();
        assert_eq!(detector.detect_zscore(&rows, Metric::Humidity), vec![50]);

        let constant = series(Metric::Humidity, &[Some(50.0); 10]);
        assert!(detector.detect_zscore(&constant, Metric::Humidity).is_empty());
    }

    #[test]
    fn test_combined_is_deduplicated_union() {
        // 150 is both an IQR and a business outlier; 101 only breaks the business rule
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(90.0 + (i % 10) as f64)).collect();
        values.push(Some(150.0));
        values.push(Some(100.5));
        let rows = series(Metric::Humidity, &values);

        let detector = OutlierDetector::new();
        let combined = detector.detect_combined(&rows, Metric::Humidity);
        assert_eq!(combined, vec![20, 21]);
    }
}
