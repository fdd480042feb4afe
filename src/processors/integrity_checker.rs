use crate::error::{AnalyticsError, Result};
use crate::models::{Metric, Observation, ObservationStatus};
use crate::processors::imputation::{backward_fill, forward_fill};
use crate::utils::constants::REQUIRED_COLUMNS;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub missing_data_records: usize,
    pub out_of_range_counts: BTreeMap<Metric, usize>,
    pub violations: Vec<Violation>,
    pub metric_statistics: BTreeMap<Metric, MetricStatistics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub city: String,
    pub timestamp: NaiveDateTime,
    pub metric: Metric,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    OutOfRange,
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricStatistics {
    pub present: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Input validation and standardization ahead of the quality pipeline.
pub struct IntegrityChecker {
    clip_negative: [Metric; 4],
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self {
            clip_negative: [
                Metric::Pressure,
                Metric::Humidity,
                Metric::Precipitation,
                Metric::WindSpeed,
            ],
        }
    }

    /// Check that every required input column is present.
    pub fn validate_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<()> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| !columns.iter().any(|c| c.as_ref().trim() == **required))
            .map(|c| c.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            warn!("Input is missing required columns: {:?}", missing);
            Err(AnalyticsError::MissingField(missing))
        }
    }

    /// Check integrity of raw observations
    pub fn check_integrity(&self, observations: &[Observation]) -> Result<IntegrityReport> {
        let mut report = IntegrityReport {
            total_records: observations.len(),
            ..Default::default()
        };

        for obs in observations {
            obs.validate()?;
            self.check_record(obs, &mut report);
        }

        for metric in Metric::ALL {
            let values: Vec<f64> = observations.iter().filter_map(|o| o.value(metric)).collect();
            let stats = MetricStatistics {
                present: values.len(),
                missing: observations.len() - values.len(),
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
                mean: crate::utils::stats::mean(&values),
            };
            report.metric_statistics.insert(metric, stats);
        }

        Ok(report)
    }

    fn check_record(&self, obs: &Observation, report: &mut IntegrityReport) {
        let mut out_of_range = false;

        for metric in Metric::ALL {
            match obs.value(metric) {
                Some(value) if !metric.rule().contains(value) => {
                    let rule = metric.rule();
                    out_of_range = true;
                    *report.out_of_range_counts.entry(metric).or_default() += 1;
                    report.violations.push(Violation {
                        city: obs.city.clone(),
                        timestamp: obs.timestamp,
                        metric,
                        violation_type: ViolationType::OutOfRange,
                        details: format!(
                            "{} value {} is outside valid range [{}, {}] {}",
                            metric, value, rule.min, rule.max, rule.unit
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    report.violations.push(Violation {
                        city: obs.city.clone(),
                        timestamp: obs.timestamp,
                        metric,
                        violation_type: ViolationType::Missing,
                        details: format!("{} is missing", metric),
                    });
                }
            }
        }

        if out_of_range || obs.status == ObservationStatus::Invalid {
            report.invalid_records += 1;
        } else {
            report.valid_records += 1;
        }

        if !obs.is_complete() {
            report.missing_data_records += 1;
        }
    }

    /// Replace out-of-range values with missing and mark their records invalid.
    /// Returns the new rows and the per-metric count of replaced values.
    pub fn validate_range(
        &self,
        observations: &[Observation],
    ) -> (Vec<Observation>, BTreeMap<Metric, usize>) {
        let mut replaced: BTreeMap<Metric, usize> = BTreeMap::new();
        let mut output = observations.to_vec();

        for obs in output.iter_mut() {
            for metric in Metric::ALL {
                if let Some(value) = obs.value(metric) {
                    if !metric.rule().contains(value) {
                        obs.set_value(metric, None);
                        obs.status = ObservationStatus::Invalid;
                        *replaced.entry(metric).or_default() += 1;
                    }
                }
            }
        }

        for (metric, count) in &replaced {
            let rule = metric.rule();
            warn!(
                metric = %metric,
                count,
                "Values outside [{}, {}] replaced with missing",
                rule.min,
                rule.max
            );
        }

        (output, replaced)
    }

    /// Forward-fill then back-fill every metric within each city, clip the
    /// non-negative metrics at zero and wrap wind direction into [0, 360).
    pub fn standardize(&self, observations: &[Observation]) -> Vec<Observation> {
        let mut output = observations.to_vec();
        output.sort_by(|a, b| a.city.cmp(&b.city).then_with(|| a.timestamp.cmp(&b.timestamp)));

        let mut start = 0;
        while start < output.len() {
            let end = output[start..]
                .iter()
                .position(|o| o.city != output[start].city)
                .map_or(output.len(), |offset| start + offset);

            let group = &mut output[start..end];
            for metric in Metric::ALL {
                let mut column: Vec<Option<f64>> = group.iter().map(|o| o.value(metric)).collect();
                forward_fill(&mut column);
                backward_fill(&mut column);
                for (obs, value) in group.iter_mut().zip(column) {
                    obs.set_value(metric, value);
                }
            }
            start = end;
        }

        for obs in output.iter_mut() {
            for metric in self.clip_negative {
                if let Some(value) = obs.value(metric) {
                    obs.set_value(metric, Some(value.max(0.0)));
                }
            }
            if let Some(direction) = obs.wind_direction {
                obs.wind_direction = Some(direction.rem_euclid(360.0));
            }
        }

        output
    }

    /// Integrity report on the raw rows, then range validation and
    /// standardization.
    pub fn validate_and_standardize(
        &self,
        observations: &[Observation],
    ) -> Result<(Vec<Observation>, IntegrityReport)> {
        let report = self.check_integrity(observations)?;
        let (ranged, _) = self.validate_range(observations);
        let standardized = self.standardize(&ranged);

        info!(
            total = report.total_records,
            invalid = report.invalid_records,
            "Validation and standardization complete"
        );

        Ok((standardized, report))
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &IntegrityReport) -> String {
        let pct = |n: usize| {
            if report.total_records == 0 {
                0.0
            } else {
                100.0 * n as f64 / report.total_records as f64
            }
        };

        let mut summary = String::new();

        summary.push_str("=== Integrity Check Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", report.total_records));
        summary.push_str(&format!(
            "Valid Records: {} ({:.1}%)\n",
            report.valid_records,
            pct(report.valid_records)
        ));
        summary.push_str(&format!(
            "Invalid Records: {} ({:.1}%)\n",
            report.invalid_records,
            pct(report.invalid_records)
        ));
        summary.push_str(&format!(
            "Missing Data Records: {}\n",
            report.missing_data_records
        ));

        summary.push_str("\nMetric Statistics:\n");
        for (metric, stats) in &report.metric_statistics {
            match (stats.min, stats.max, stats.mean) {
                (Some(min), Some(max), Some(mean)) => summary.push_str(&format!(
                    "  {}: {} present, {} missing, min {:.2}, max {:.2}, mean {:.2}\n",
                    metric, stats.present, stats.missing, min, max, mean
                )),
                _ => summary.push_str(&format!("  {}: no values\n", metric)),
            }
        }

        let out_of_range: usize = report.out_of_range_counts.values().sum();
        summary.push_str(&format!("\nOut-of-range Values: {}\n", out_of_range));

        let range_violations: Vec<&Violation> = report
            .violations
            .iter()
            .filter(|v| v.violation_type == ViolationType::OutOfRange)
            .collect();

        if !range_violations.is_empty() {
            summary.push_str("\nTop 10 Violations:\n");
            for (i, violation) in range_violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. {} at {}: {}\n",
                    i + 1,
                    violation.city,
                    violation.timestamp,
                    violation.details
                ));
            }
        }

        summary
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}
