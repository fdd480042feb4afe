use crate::error::{AnalyticsError, Result};
use crate::models::{Metric, Observation, ObservationStatus};
use crate::processors::IntegrityChecker;
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, TIMESTAMP_FORMATS};
use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Reads observation CSV files with the columns `timestamp, city, <six
/// metrics>, source` and an optional `status` column.
#[derive(Debug, Clone, Copy)]
pub struct ObservationReader {
    use_mmap: bool,
    encoding: &'static Encoding,
}

impl ObservationReader {
    pub fn new() -> Self {
        Self {
            use_mmap: false,
            encoding: encoding_rs::UTF_8,
        }
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Decode input with the named encoding (e.g. `gbk`, `utf-16le`).
    pub fn with_encoding(mut self, label: &str) -> Result<Self> {
        self.encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            AnalyticsError::InvalidFormat(format!("Unknown text encoding: '{}'", label))
        })?;
        Ok(self)
    }

    /// Read all observations from a file
    pub fn read_observations(&self, path: &Path) -> Result<Vec<Observation>> {
        let text = if self.use_mmap {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            self.decode(&mmap, path)
        } else {
            let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, File::open(path)?);
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            self.decode(&bytes, path)
        };

        let observations = self.parse_csv(&text)?;
        debug!(path = %path.display(), rows = observations.len(), "Read observation file");
        Ok(observations)
    }

    fn decode(&self, bytes: &[u8], path: &Path) -> String {
        let (text, used, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            warn!(
                path = %path.display(),
                encoding = used.name(),
                "Input contained malformed sequences; replaced with U+FFFD"
            );
        }
        text.into_owned()
    }

    /// Parse CSV text into observations. Missing required columns are an
    /// error naming them; empty or `nan` metric cells are missing values.
    pub fn parse_csv(&self, text: &str) -> Result<Vec<Observation>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        let columns: Vec<&str> = headers.iter().collect();
        IntegrityChecker::new().validate_columns(&columns)?;

        let index = |name: &str| columns.iter().position(|c| *c == name);
        // validate_columns guarantees these exist
        let ts_idx = index("timestamp").unwrap_or_default();
        let city_idx = index("city").unwrap_or_default();
        let source_idx = index("source").unwrap_or_default();
        let status_idx = index("status");
        let metric_idx: Vec<(Metric, usize)> = Metric::ALL
            .into_iter()
            .filter_map(|m| index(m.name()).map(|i| (m, i)))
            .collect();

        let mut observations = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let line = row + 2;
            let field = |i: usize| record.get(i).unwrap_or("");

            let timestamp = parse_timestamp(field(ts_idx)).ok_or_else(|| {
                AnalyticsError::InvalidFormat(format!(
                    "Invalid timestamp '{}' on line {}",
                    field(ts_idx),
                    line
                ))
            })?;

            let mut obs = Observation::new(field(city_idx), timestamp, field(source_idx));
            for (metric, i) in &metric_idx {
                obs.set_value(*metric, parse_metric(field(*i), *metric, line)?);
            }
            if let Some(i) = status_idx {
                if field(i).eq_ignore_ascii_case("invalid") {
                    obs.status = ObservationStatus::Invalid;
                }
            }

            observations.push(obs);
        }

        Ok(observations)
    }
}

impl Default for ObservationReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a timestamp in any accepted layout; a bare date means midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_metric(s: &str, metric: Metric, line: usize) -> Result<Option<f64>> {
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(AnalyticsError::InvalidFormat(format!(
            "Invalid {} value '{}' on line {}",
            metric, s, line
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "timestamp,city,temperature,pressure,humidity,precipitation,wind_speed,wind_direction,source";

    #[test]
    fn test_parse_csv_rows() {
        let text = format!(
            "{HEADER}\n2024-01-01 00:00:00,beijing,-3.5,1025,30,0,2.5,315,Meteostat\n\
             2024-01-01T01:00:00,beijing,,1024,NaN,0,3,320,Meteostat\n"
        );
        let rows = ObservationReader::new().parse_csv(&text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temperature, Some(-3.5));
        assert_eq!(rows[0].wind_direction, Some(315.0));
        assert_eq!(rows[1].temperature, None);
        assert_eq!(rows[1].humidity, None);
        assert_eq!(rows[1].timestamp.format("%H").to_string(), "01");
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let text = "timestamp,city,temperature\n2024-01-01 00:00:00,beijing,1\n";
        let err = ObservationReader::new().parse_csv(text).unwrap_err();
        match err {
            AnalyticsError::MissingField(fields) => assert_eq!(fields.len(), 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_values_name_the_line() {
        let text = format!("{HEADER}\n2024-01-01 00:00:00,beijing,warm,1,1,1,1,1,Kaggle\n");
        let err = ObservationReader::new().parse_csv(&text).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let text = format!("{HEADER}\nyesterday,beijing,1,1,1,1,1,1,Kaggle\n");
        assert!(ObservationReader::new().parse_csv(&text).is_err());
    }

    #[test]
    fn test_infinite_values_are_rejected() {
        for bad in ["inf", "-inf", "Infinity"] {
            let text = format!(
                "{HEADER}\n2024-01-01 00:00:00,beijing,{bad},1025,30,0,2.5,315,Meteostat\n"
            );
            let err = ObservationReader::new().parse_csv(&text).unwrap_err();
            assert!(matches!(err, AnalyticsError::InvalidFormat(_)));
            assert!(err.to_string().contains("line 2"));
        }
    }

    #[test]
    fn test_read_gbk_file_with_mmap() {
        let text = format!("{HEADER}\n2024-05-01,北京,20,1010,50,0,1,90,Meteostat\n");
        let (encoded, _, _) = encoding_rs::GBK.encode(&text);

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encoded).unwrap();

        let rows = ObservationReader::new()
            .with_mmap(true)
            .with_encoding("gbk")
            .unwrap()
            .read_observations(file.path())
            .unwrap();
        assert_eq!(rows[0].city, "北京");
        assert_eq!(rows[0].timestamp.format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(ObservationReader::new().with_encoding("klingon").is_err());
    }
}
