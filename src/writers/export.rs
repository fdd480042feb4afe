use crate::error::{AnalyticsError, Result};
use crate::models::{CleaningLogEntry, CorrelationMatrix, RegionalTable, TimeAggregate};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        ext.parse()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(AnalyticsError::InvalidFormat(format!(
                "Unsupported export format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

/// A result with a fixed column layout.
pub trait Tabular {
    fn headers(&self) -> Vec<String>;
    fn rows(&self) -> Vec<Vec<Value>>;
}

impl Tabular for TimeAggregate {
    fn headers(&self) -> Vec<String> {
        ["period", "count", "mean", "max", "min", "std"]
            .map(String::from)
            .to_vec()
    }

    fn rows(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    json!(r.period.to_string()),
                    json!(r.count),
                    json!(r.mean),
                    json!(r.max),
                    json!(r.min),
                    json!(r.std),
                ]
            })
            .collect()
    }
}

impl Tabular for RegionalTable {
    fn headers(&self) -> Vec<String> {
        std::iter::once("period".to_string())
            .chain(self.cities.iter().cloned())
            .collect()
    }

    fn rows(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|r| {
                std::iter::once(json!(r.period.to_string()))
                    .chain(r.values.iter().map(|v| json!(v)))
                    .collect()
            })
            .collect()
    }
}

impl Tabular for CorrelationMatrix {
    fn headers(&self) -> Vec<String> {
        std::iter::once("metric".to_string())
            .chain(self.metrics.iter().map(|m| m.to_string()))
            .collect()
    }

    fn rows(&self) -> Vec<Vec<Value>> {
        self.metrics
            .iter()
            .zip(&self.values)
            .map(|(metric, row)| {
                std::iter::once(json!(metric.to_string()))
                    // NaN has no JSON form; serde_json writes it as null
                    .chain(row.iter().map(|v| json!(v)))
                    .collect()
            })
            .collect()
    }
}

impl Tabular for [CleaningLogEntry] {
    fn headers(&self) -> Vec<String> {
        [
            "process_time",
            "data_source",
            "field",
            "process_type",
            "method",
            "before_count",
            "after_count",
            "affected_count",
            "description",
        ]
        .map(String::from)
        .to_vec()
    }

    fn rows(&self) -> Vec<Vec<Value>> {
        self.iter()
            .map(|e| {
                vec![
                    json!(e.process_time.format("%Y-%m-%d %H:%M:%S").to_string()),
                    json!(e.data_source),
                    json!(e.field.to_string()),
                    json!(e.process_type.to_string()),
                    json!(e.method),
                    json!(e.before_count),
                    json!(e.after_count),
                    json!(e.affected_count),
                    json!(e.description),
                ]
            })
            .collect()
    }
}

/// Serializes analysis results. Tables go to CSV or JSON (an array of row
/// objects); lists of records only to JSON.
pub struct Exporter;

impl Exporter {
    pub fn write_table<T, W>(table: &T, format: ExportFormat, writer: W) -> Result<()>
    where
        T: Tabular + ?Sized,
        W: Write,
    {
        let headers = table.headers();
        let rows = table.rows();

        match format {
            ExportFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                csv_writer.write_record(&headers)?;
                for row in rows {
                    csv_writer.write_record(row.iter().map(cell_text))?;
                }
                csv_writer.flush()?;
            }
            ExportFormat::Json => {
                let objects: Vec<Map<String, Value>> = rows
                    .into_iter()
                    .map(|row| headers.iter().cloned().zip(row).collect())
                    .collect();
                serde_json::to_writer_pretty(writer, &objects)?;
            }
        }
        Ok(())
    }

    pub fn write_list<T, W>(items: &[T], format: ExportFormat, writer: W) -> Result<()>
    where
        T: Serialize,
        W: Write,
    {
        match format {
            ExportFormat::Json => Ok(serde_json::to_writer_pretty(writer, items)?),
            ExportFormat::Csv => Err(AnalyticsError::InvalidFormat(
                "List results can only be exported as JSON".to_string(),
            )),
        }
    }

    /// Write a single serializable value (e.g. a forecast) as JSON
    pub fn write_json<T: Serialize + ?Sized, W: Write>(value: &T, writer: W) -> Result<()> {
        Ok(serde_json::to_writer_pretty(writer, value)?)
    }

    /// Write a table to `path`, choosing the format from its extension
    pub fn table_to_file<T: Tabular + ?Sized>(table: &T, path: &Path) -> Result<()> {
        let format = ExportFormat::from_path(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        Self::write_table(table, format, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a record list to `path` as JSON. Nothing is created when the
    /// extension asks for another format.
    pub fn list_to_file<T: Serialize>(items: &[T], path: &Path) -> Result<()> {
        let format = ExportFormat::from_path(path)?;
        let mut buffer = Vec::new();
        Self::write_list(items, format, &mut buffer)?;
        std::fs::write(path, buffer)?;
        Ok(())
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, Period, PeriodKey, PeriodStats, Season};
    use pretty_assertions::assert_eq;

    fn seasonal() -> TimeAggregate {
        TimeAggregate {
            city: "beijing".to_string(),
            metric: Metric::Temperature,
            period: Period::Seasonal,
            rows: vec![PeriodStats {
                period: PeriodKey::Season(Season::Summer),
                count: 2,
                mean: 30.5,
                max: 31.0,
                min: 30.0,
                std: 0.5,
            }],
        }
    }

    #[test]
    fn test_table_to_csv() {
        let mut out = Vec::new();
        Exporter::write_table(&seasonal(), ExportFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "period,count,mean,max,min,std\nsummer,2,30.5,31.0,30.0,0.5\n");
    }

    #[test]
    fn test_table_to_json_objects() {
        let mut out = Vec::new();
        Exporter::write_table(&seasonal(), ExportFormat::Json, &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["period"], json!("summer"));
        assert_eq!(value[0]["count"], json!(2));
    }

    #[test]
    fn test_regional_missing_cells_are_blank() {
        let table = RegionalTable {
            metric: Metric::Humidity,
            period: Period::Monthly,
            cities: vec!["beijing".to_string(), "chengdu".to_string()],
            rows: vec![crate::models::RegionalRow {
                period: PeriodKey::Month { year: 2024, month: 1 },
                values: vec![Some(40.0), None],
            }],
        };
        let mut out = Vec::new();
        Exporter::write_table(&table, ExportFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("period,beijing,chengdu\n"));
        assert!(text.trim_end().ends_with(",40.0,"));
    }

    #[test]
    fn test_lists_are_json_only() {
        let items = vec![json!({"city": "shenzhen"})];
        let mut out = Vec::new();
        assert!(Exporter::write_list(&items, ExportFormat::Csv, &mut out).is_err());
        Exporter::write_list(&items, ExportFormat::Json, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("shenzhen"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out/table.CSV")).unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::from_path(Path::new("out/table.xlsx")).is_err());
    }
}
