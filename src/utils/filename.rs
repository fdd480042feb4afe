use chrono::{Datelike, Local, NaiveDateTime};
use std::path::{Path, PathBuf};

use crate::utils::constants::{CLEANING_REPORT_PREFIX, CLEANING_SUMMARY_PREFIX};

/// Generate default Parquet filename with format: {dir}/weather-cleaned-{city}-{YYMMDD}.parquet
pub fn generate_default_parquet_filename(dir: &Path, city: &str) -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100; // Get last 2 digits of year
    let month = now.month();
    let day = now.day();

    let filename = format!(
        "weather-cleaned-{}-{:02}{:02}{:02}.parquet",
        sanitize(city),
        year,
        month,
        day
    );
    dir.join(filename)
}

/// Detailed and summary cleaning report paths stamped with `at`:
/// `data_cleaning_report_{YYYYMMDD_HHMMSS}.csv` / `data_cleaning_summary_...`
pub fn cleaning_report_paths(dir: &Path, at: NaiveDateTime) -> (PathBuf, PathBuf) {
    let stamp = at.format("%Y%m%d_%H%M%S");
    (
        dir.join(format!("{}_{}.csv", CLEANING_REPORT_PREFIX, stamp)),
        dir.join(format!("{}_{}.csv", CLEANING_SUMMARY_PREFIX, stamp)),
    )
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "all".to_string()
    } else {
        cleaned
    }
}
