use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::QualityConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::{
    CleanedBatch, CleaningLog, CleaningLogEntry, DataKind, Metric, Observation, ObservationRow,
    ProcessType,
};
use crate::processors::imputation::{
    backward_fill, fill_constant, forward_fill, interpolate_linear, knn_impute,
};
use crate::processors::outliers::OutlierDetector;
use crate::processors::transforms;
use crate::utils::constants::{DEFAULT_KNN_NEIGHBORS, UNKNOWN_SOURCE};
use crate::utils::stats;

/// How flagged outliers are repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Drop,
    Mean,
    Median,
    #[default]
    Interpolate,
    #[serde(rename = "ffill")]
    ForwardFill,
    #[serde(rename = "bfill")]
    BackwardFill,
}

impl OutlierMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OutlierMethod::Drop => "drop",
            OutlierMethod::Mean => "mean",
            OutlierMethod::Median => "median",
            OutlierMethod::Interpolate => "interpolate",
            OutlierMethod::ForwardFill => "ffill",
            OutlierMethod::BackwardFill => "bfill",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutlierMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(OutlierMethod::Drop),
            "mean" => Ok(OutlierMethod::Mean),
            "median" => Ok(OutlierMethod::Median),
            "interpolate" => Ok(OutlierMethod::Interpolate),
            "ffill" => Ok(OutlierMethod::ForwardFill),
            "bfill" => Ok(OutlierMethod::BackwardFill),
            other => Err(AnalyticsError::InvalidFormat(format!(
                "Unknown outlier method '{}'",
                other
            ))),
        }
    }
}

/// How missing cells are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingMethod {
    Drop,
    Mean,
    Median,
    Mode,
    #[default]
    Interpolate,
    #[serde(rename = "ffill")]
    ForwardFill,
    #[serde(rename = "bfill")]
    BackwardFill,
    Knn,
}

impl MissingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            MissingMethod::Drop => "drop",
            MissingMethod::Mean => "mean",
            MissingMethod::Median => "median",
            MissingMethod::Mode => "mode",
            MissingMethod::Interpolate => "interpolate",
            MissingMethod::ForwardFill => "ffill",
            MissingMethod::BackwardFill => "bfill",
            MissingMethod::Knn => "knn",
        }
    }

    /// Default missing-value strategy for a declared batch kind.
    pub fn default_for(kind: DataKind) -> Self {
        match kind {
            DataKind::Realtime => MissingMethod::ForwardFill,
            DataKind::Historical => MissingMethod::Interpolate,
            DataKind::Extreme => MissingMethod::Mean,
        }
    }
}

impl fmt::Display for MissingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MissingMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(MissingMethod::Drop),
            "mean" => Ok(MissingMethod::Mean),
            "median" => Ok(MissingMethod::Median),
            "mode" => Ok(MissingMethod::Mode),
            "interpolate" => Ok(MissingMethod::Interpolate),
            "ffill" => Ok(MissingMethod::ForwardFill),
            "bfill" => Ok(MissingMethod::BackwardFill),
            "knn" => Ok(MissingMethod::Knn),
            other => Err(AnalyticsError::InvalidFormat(format!(
                "Unknown missing-value method '{}'",
                other
            ))),
        }
    }
}

/// Cleaned batch plus the cleaning-log entries produced while building it.
#[derive(Debug, Clone)]
pub struct PreprocessOutcome {
    pub batch: CleanedBatch,
    pub cleaning_log: Vec<CleaningLogEntry>,
}

/// Detects and repairs bad values in a single city's series.
///
/// Every operation works on a copy of the caller's rows, sorted by
/// timestamp. Remediation steps append to the `CleaningLog` they are given.
#[derive(Debug, Clone)]
pub struct QualityProcessor {
    detector: OutlierDetector,
    knn_neighbors: usize,
}

impl QualityProcessor {
    pub fn new() -> Self {
        Self {
            detector: OutlierDetector::new(),
            knn_neighbors: DEFAULT_KNN_NEIGHBORS,
        }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            detector: OutlierDetector::from_config(config),
            knn_neighbors: config.knn_neighbors,
        }
    }

    pub fn with_knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = k;
        self
    }

    pub fn detector(&self) -> &OutlierDetector {
        &self.detector
    }

    /// Repair rows flagged by the IQR or business-rule detectors for `metric`.
    /// Returns the repaired copy and the number of flagged rows. Nothing is
    /// logged when no row is flagged.
    pub fn handle_outliers<R: ObservationRow>(
        &self,
        rows: &[R],
        metric: Metric,
        method: OutlierMethod,
        log: &mut CleaningLog,
    ) -> Result<(Vec<R>, usize)> {
        let mut output = sorted_copy(rows);
        let flagged = self.detector.detect_combined(&output, metric);
        if flagged.is_empty() {
            return Ok((output, 0));
        }

        let count = flagged.len();
        log.record(
            &source_label(&output),
            metric,
            ProcessType::Outlier,
            method.name(),
            output.len(),
            count,
        );
        debug!(metric = %metric, method = %method, count, "Repairing outliers");

        match method {
            OutlierMethod::Drop => {
                let flagged: HashSet<usize> = flagged.into_iter().collect();
                output = output
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| !flagged.contains(i))
                    .map(|(_, r)| r)
                    .collect();
            }
            // Both statistics are taken over the column with the outliers still in it
            OutlierMethod::Mean | OutlierMethod::Median => {
                let values = stats::column_values(&output, metric);
                let fill = if method == OutlierMethod::Mean {
                    stats::mean(&values)
                } else {
                    stats::median(&values)
                };
                for i in flagged {
                    output[i].observation_mut().set_value(metric, fill);
                }
            }
            OutlierMethod::Interpolate | OutlierMethod::ForwardFill | OutlierMethod::BackwardFill => {
                let mut column = column_of(&output, metric);
                for i in flagged {
                    column[i] = None;
                }
                match method {
                    OutlierMethod::Interpolate => interpolate_linear(&mut column),
                    OutlierMethod::ForwardFill => forward_fill(&mut column),
                    _ => backward_fill(&mut column),
                }
                write_column(&mut output, metric, &column);
            }
        }

        Ok((output, count))
    }

    /// Fill missing cells of `metric`. Returns the filled copy and the number
    /// of cells that were missing. `Knn` imputes all six metrics jointly.
    pub fn handle_missing_values<R: ObservationRow>(
        &self,
        rows: &[R],
        metric: Metric,
        method: MissingMethod,
        log: &mut CleaningLog,
    ) -> Result<(Vec<R>, usize)> {
        let mut output = sorted_copy(rows);
        let mut column = column_of(&output, metric);
        let missing = column.iter().filter(|v| v.is_none()).count();
        if missing == 0 {
            return Ok((output, 0));
        }

        let values = stats::column_values(&output, metric);
        let constant = match method {
            MissingMethod::Mean => Some(stats::mean(&values)),
            MissingMethod::Median => Some(stats::median(&values)),
            MissingMethod::Mode => Some(stats::mode(&values)),
            _ => None,
        };
        if let Some(None) = constant {
            return Err(AnalyticsError::DegenerateColumn {
                column: metric.to_string(),
                reason: format!("no values present to compute the {}", method),
            });
        }

        log.record(
            &source_label(&output),
            metric,
            ProcessType::Missing,
            method.name(),
            output.len(),
            missing,
        );
        debug!(metric = %metric, method = %method, count = missing, "Filling missing values");

        match method {
            MissingMethod::Drop => {
                output.retain(|r| r.observation().value(metric).is_some());
            }
            MissingMethod::Mean | MissingMethod::Median | MissingMethod::Mode => {
                if let Some(Some(fill)) = constant {
                    fill_constant(&mut column, fill);
                    write_column(&mut output, metric, &column);
                }
            }
            MissingMethod::Interpolate => {
                interpolate_linear(&mut column);
                write_column(&mut output, metric, &column);
            }
            MissingMethod::ForwardFill => {
                forward_fill(&mut column);
                write_column(&mut output, metric, &column);
            }
            MissingMethod::BackwardFill => {
                backward_fill(&mut column);
                write_column(&mut output, metric, &column);
            }
            MissingMethod::Knn => {
                let mut matrix: Vec<[Option<f64>; 6]> =
                    output.iter().map(|r| r.observation().values()).collect();
                let filled = knn_impute(&mut matrix, self.knn_neighbors);
                debug!(filled, "KNN imputation filled cells across all metrics");
                for (row, values) in output.iter_mut().zip(matrix) {
                    for m in Metric::ALL {
                        row.observation_mut().set_value(m, values[m.index()]);
                    }
                }
            }
        }

        Ok((output, missing))
    }

    /// Run the full pipeline on one city's batch: time decomposition, missing
    /// values, outliers, encoding, normalization and sanitization.
    ///
    /// A failing remediation step keeps its input and logs a warning. Input
    /// that fails shape validation is rejected outright.
    pub fn preprocess(&self, observations: &[Observation], kind: DataKind) -> Result<PreprocessOutcome> {
        validate_batch(observations)?;

        let city = observations
            .first()
            .map(|o| o.city.clone())
            .unwrap_or_default();

        if observations.is_empty() {
            debug!(kind = %kind, "Empty batch, nothing to preprocess");
            return Ok(PreprocessOutcome {
                batch: CleanedBatch::empty(city, kind),
                cleaning_log: Vec::new(),
            });
        }

        info!(city = %city, kind = %kind, rows = observations.len(), "Starting preprocessing");

        let mut log = CleaningLog::new();
        let mut records = transforms::decompose_time(observations);

        let missing_method = MissingMethod::default_for(kind);
        for metric in Metric::ALL {
            match self.handle_missing_values(&records, metric, missing_method, &mut log) {
                Ok((repaired, _)) => records = repaired,
                Err(e) => warn!(city = %city, metric = %metric, method = %missing_method, "Missing-value step failed: {}", e),
            }
        }

        for metric in Metric::ALL {
            match self.handle_outliers(&records, metric, OutlierMethod::Interpolate, &mut log) {
                Ok((repaired, _)) => records = repaired,
                Err(e) => warn!(city = %city, metric = %metric, "Outlier step failed: {}", e),
            }
        }

        let records = transforms::encode_categorical(&records);
        let (records, normalized_metrics) = transforms::normalize_minmax(&records, &Metric::ALL);
        let (records, standardized_metrics) = transforms::normalize_zscore(&records, &Metric::ALL);

        let mut batch = CleanedBatch {
            city: city.clone(),
            kind,
            records,
            normalized_metrics,
            standardized_metrics,
        };
        transforms::sanitize(&mut batch);

        let cleaning_log = log.drain();
        info!(
            city = %city,
            rows = batch.len(),
            log_entries = cleaning_log.len(),
            "Preprocessing complete"
        );

        Ok(PreprocessOutcome { batch, cleaning_log })
    }
}

impl Default for QualityProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject batches with invalid rows or more than one city.
fn validate_batch(observations: &[Observation]) -> Result<()> {
    let Some(first) = observations.first() else {
        return Ok(());
    };

    for obs in observations {
        obs.validate()?;
        if obs.city != first.city {
            return Err(AnalyticsError::MixedCities {
                expected: first.city.clone(),
                found: obs.city.clone(),
            });
        }
    }
    Ok(())
}

fn sorted_copy<R: ObservationRow>(rows: &[R]) -> Vec<R> {
    let mut output = rows.to_vec();
    output.sort_by_key(|r| r.observation().timestamp);
    output
}

fn column_of<R: ObservationRow>(rows: &[R], metric: Metric) -> Vec<Option<f64>> {
    rows.iter().map(|r| r.observation().value(metric)).collect()
}

fn write_column<R: ObservationRow>(rows: &mut [R], metric: Metric, column: &[Option<f64>]) {
    for (row, value) in rows.iter_mut().zip(column) {
        row.observation_mut().set_value(metric, *value);
    }
}

/// The batch's single source name, or `unknown` when mixed or empty.
fn source_label<R: ObservationRow>(rows: &[R]) -> String {
    let mut sources = rows.iter().map(|r| r.observation().source.as_str());
    match sources.next() {
        Some(first) if sources.all(|s| s == first) => first.to_string(),
        _ => UNKNOWN_SOURCE.to_string(),
    }
}
