use crate::error::Result;
use crate::models::cleaning_log::summarize;
use crate::models::CleaningLogEntry;
use crate::utils::filename::cleaning_report_paths;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths of a written cleaning report
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningReportPaths {
    pub detail: PathBuf,
    pub summary: PathBuf,
}

/// Writes a cleaning log as a detailed CSV plus a per-(process type, field)
/// summary CSV, both stamped with the report time.
pub struct CleaningReportWriter {
    output_dir: PathBuf,
}

impl CleaningReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns `None` without touching the filesystem when there is nothing
    /// to report.
    pub fn write(
        &self,
        entries: &[CleaningLogEntry],
        at: NaiveDateTime,
    ) -> Result<Option<CleaningReportPaths>> {
        if entries.is_empty() {
            info!("Cleaning log is empty, no report written");
            return Ok(None);
        }

        fs::create_dir_all(&self.output_dir)?;
        let (detail, summary) = cleaning_report_paths(&self.output_dir, at);

        super::Exporter::table_to_file(entries, &detail)?;

        let mut writer = csv::Writer::from_path(&summary)?;
        writer.write_record(["process_type", "field", "affected_count", "method"])?;
        for row in summarize(entries) {
            writer.write_record([
                row.process_type.to_string(),
                row.field.to_string(),
                row.affected_count.to_string(),
                row.method,
            ])?;
        }
        writer.flush()?;

        info!(
            entries = entries.len(),
            detail = %detail.display(),
            summary = %summary.display(),
            "Cleaning report written"
        );
        Ok(Some(CleaningReportPaths { detail, summary }))
    }
}
