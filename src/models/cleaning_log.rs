use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::observation::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    Outlier,
    Missing,
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::Outlier => write!(f, "outlier"),
            ProcessType::Missing => write!(f, "missing"),
        }
    }
}

/// Audit record of one remediation action. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningLogEntry {
    pub process_time: DateTime<Utc>,
    pub data_source: String,
    pub field: Metric,
    pub process_type: ProcessType,
    pub method: String,
    pub before_count: usize,
    pub after_count: usize,
    pub affected_count: usize,
    pub description: String,
}

/// Append-only accumulator threaded through remediation calls.
#[derive(Debug, Clone, Default)]
pub struct CleaningLog {
    entries: Vec<CleaningLogEntry>,
}

impl CleaningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        data_source: &str,
        field: Metric,
        process_type: ProcessType,
        method: &str,
        before_count: usize,
        affected_count: usize,
    ) {
        let description = match process_type {
            ProcessType::Outlier => format!(
                "Detected {} outliers in {}, handled with {}",
                affected_count, field, method
            ),
            ProcessType::Missing => format!(
                "Detected {} missing values in {}, handled with {}",
                affected_count, field, method
            ),
        };

        self.entries.push(CleaningLogEntry {
            process_time: Utc::now(),
            data_source: data_source.to_string(),
            field,
            process_type,
            method: method.to_string(),
            before_count,
            after_count: before_count.saturating_sub(affected_count),
            affected_count,
            description,
        });
    }

    pub fn entries(&self) -> &[CleaningLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand the entries to the caller and leave the accumulator empty.
    pub fn drain(&mut self) -> Vec<CleaningLogEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn into_entries(self) -> Vec<CleaningLogEntry> {
        self.entries
    }
}

/// One row of the grouped cleaning summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningSummaryRow {
    pub process_type: ProcessType,
    pub field: Metric,
    pub affected_count: usize,
    pub method: String,
}

/// Group entries by (process type, field): affected counts are summed and the
/// first method seen is kept. Rows come out sorted by the group key.
pub fn summarize(entries: &[CleaningLogEntry]) -> Vec<CleaningSummaryRow> {
    let mut groups: std::collections::BTreeMap<(ProcessType, Metric), CleaningSummaryRow> =
        std::collections::BTreeMap::new();

    for entry in entries {
        groups
            .entry((entry.process_type, entry.field))
            .and_modify(|row| row.affected_count += entry.affected_count)
            .or_insert_with(|| CleaningSummaryRow {
                process_type: entry.process_type,
                field: entry.field,
                affected_count: entry.affected_count,
                method: entry.method.clone(),
            });
    }

    groups.into_values().collect()
}
