//! Non-destructive column derivations: time decomposition, categorical
//! encoding, min-max / z-score normalization and final sanitization.

use tracing::debug;

use crate::models::rules::{city_code, source_code};
use crate::models::{CleanedBatch, CleanedRecord, Metric, Observation};
use crate::utils::stats;

/// Derive year/month/day/hour/minute/second for every observation. The
/// timestamp itself is kept.
pub fn decompose_time(observations: &[Observation]) -> Vec<CleanedRecord> {
    observations.iter().cloned().map(CleanedRecord::new).collect()
}

/// Map city and source names to their fixed identifiers; unknown names get
/// no encoding.
pub fn encode_categorical(records: &[CleanedRecord]) -> Vec<CleanedRecord> {
    records
        .iter()
        .map(|r| {
            let mut record = r.clone();
            record.city_id = city_code(&record.observation.city);
            record.source_id = source_code(&record.observation.source);
            record
        })
        .collect()
}

/// Add a `(v - min) / (max - min)` column for each metric whose values are
/// not all equal. Returns the new rows and the metrics that got a column.
pub fn normalize_minmax(
    records: &[CleanedRecord],
    metrics: &[Metric],
) -> (Vec<CleanedRecord>, Vec<Metric>) {
    let mut output = records.to_vec();
    let mut added = Vec::new();

    for &metric in metrics {
        let values = stats::column_values(records, metric);
        let (Some(min), Some(max)) = (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ) else {
            continue;
        };

        if max <= min {
            debug!(metric = %metric, "Skipping min-max normalization of constant column");
            continue;
        }

        let range = max - min;
        for record in output.iter_mut() {
            record.normalized[metric.index()] =
                record.observation.value(metric).map(|v| (v - min) / range);
        }
        added.push(metric);
    }

    (output, added)
}

/// Add a `(v - mean) / std` column (sample std) for each metric with positive
/// spread. Returns the new rows and the metrics that got a column.
pub fn normalize_zscore(
    records: &[CleanedRecord],
    metrics: &[Metric],
) -> (Vec<CleanedRecord>, Vec<Metric>) {
    let mut output = records.to_vec();
    let mut added = Vec::new();

    for &metric in metrics {
        let values = stats::column_values(records, metric);
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::sample_std(&values)) else {
            continue;
        };

        if std <= 0.0 {
            debug!(metric = %metric, "Skipping z-score normalization of zero-variance column");
            continue;
        }

        for record in output.iter_mut() {
            record.standardized[metric.index()] =
                record.observation.value(metric).map(|v| (v - mean) / std);
        }
        added.push(metric);
    }

    (output, added)
}

/// Force every remaining missing metric, and every missing cell of an existing
/// normalized or z-score column, to 0.
pub fn sanitize(batch: &mut CleanedBatch) {
    for record in batch.records.iter_mut() {
        for metric in Metric::ALL {
            if record.observation.value(metric).is_none() {
                record.observation.set_value(metric, Some(0.0));
            }
        }
        for metric in &batch.normalized_metrics {
            record.normalized[metric.index()].get_or_insert(0.0);
        }
        for metric in &batch.standardized_metrics {
            record.standardized[metric.index()].get_or_insert(0.0);
        }
    }
}
