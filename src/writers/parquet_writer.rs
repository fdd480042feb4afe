use crate::error::{AnalyticsError, Result};
use crate::models::{CleanedBatch, CleanedRecord, Metric, Observation, ObservationStatus};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Writes cleaned batches to Parquet. The schema is the observation columns,
/// the decomposed time parts, the categorical codes, then one
/// `<metric>_normalized` / `<metric>_standardized` column per derived metric.
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(AnalyticsError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Write one cleaned batch. Empty batches write nothing.
    pub fn write_batch(&self, batch: &CleanedBatch, path: &Path) -> Result<()> {
        self.write_records_batched(
            &batch.records,
            &batch.normalized_metrics,
            &batch.standardized_metrics,
            path,
            self.row_group_size,
        )
    }

    /// Write records in chunks of `batch_size` for memory efficiency
    pub fn write_records_batched(
        &self,
        records: &[CleanedRecord],
        normalized: &[Metric],
        standardized: &[Metric],
        path: &Path,
        batch_size: usize,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let schema = self.create_schema(normalized, standardized);
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in records.chunks(batch_size.max(1)) {
            let batch = self.records_to_batch(chunk, normalized, standardized, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        debug!(path = %path.display(), rows = records.len(), "Wrote Parquet file");
        Ok(())
    }

    fn create_schema(&self, normalized: &[Metric], standardized: &[Metric]) -> Arc<Schema> {
        let mut fields = vec![
            Field::new("city", DataType::Utf8, false),
            Field::new(
                "timestamp",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
        ];
        for metric in Metric::ALL {
            fields.push(Field::new(metric.name(), DataType::Float64, true));
        }
        fields.extend([
            Field::new("source", DataType::Utf8, false),
            Field::new("status", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::UInt32, false),
            Field::new("day", DataType::UInt32, false),
            Field::new("hour", DataType::UInt32, false),
            Field::new("minute", DataType::UInt32, false),
            Field::new("second", DataType::UInt32, false),
            Field::new("city_id", DataType::UInt8, true),
            Field::new("source_id", DataType::UInt8, true),
        ]);
        for metric in normalized {
            fields.push(Field::new(format!("{}_normalized", metric), DataType::Float64, true));
        }
        for metric in standardized {
            fields.push(Field::new(format!("{}_standardized", metric), DataType::Float64, true));
        }

        Arc::new(Schema::new(fields))
    }

    fn records_to_batch(
        &self,
        records: &[CleanedRecord],
        normalized: &[Metric],
        standardized: &[Metric],
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.observation.city.as_str()))),
            Arc::new(TimestampMillisecondArray::from(
                records
                    .iter()
                    .map(|r| r.observation.timestamp.and_utc().timestamp_millis())
                    .collect::<Vec<i64>>(),
            )),
        ];
        for metric in Metric::ALL {
            columns.push(Arc::new(Float64Array::from(
                records.iter().map(|r| r.observation.value(metric)).collect::<Vec<_>>(),
            )));
        }
        columns.push(Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.observation.source.as_str()),
        )));
        columns.push(Arc::new(StringArray::from_iter_values(records.iter().map(|r| {
            match r.observation.status {
                ObservationStatus::Valid => "valid",
                ObservationStatus::Invalid => "invalid",
            }
        }))));
        columns.push(Arc::new(Int32Array::from(
            records.iter().map(|r| r.time.year).collect::<Vec<_>>(),
        )));
        let parts: [fn(&CleanedRecord) -> u32; 5] = [
            |r| r.time.month,
            |r| r.time.day,
            |r| r.time.hour,
            |r| r.time.minute,
            |r| r.time.second,
        ];
        for part in parts {
            columns.push(Arc::new(UInt32Array::from(
                records.iter().map(part).collect::<Vec<_>>(),
            )));
        }
        columns.push(Arc::new(UInt8Array::from(
            records.iter().map(|r| r.city_id).collect::<Vec<_>>(),
        )));
        columns.push(Arc::new(UInt8Array::from(
            records.iter().map(|r| r.source_id).collect::<Vec<_>>(),
        )));
        for &metric in normalized {
            columns.push(Arc::new(Float64Array::from(
                records.iter().map(|r| r.normalized_value(metric)).collect::<Vec<_>>(),
            )));
        }
        for &metric in standardized {
            columns.push(Arc::new(Float64Array::from(
                records.iter().map(|r| r.standardized_value(metric)).collect::<Vec<_>>(),
            )));
        }

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    /// Read up to `limit` observations back from a file written by this
    /// writer. A limit of 0 reads everything.
    pub fn read_observations(&self, path: &Path, limit: usize) -> Result<Vec<Observation>> {
        let file = File::open(path)?;
        let batch_size = if limit == 0 { 8192 } else { limit.min(8192) };
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(batch_size)
            .build()?;

        let mut observations = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;

            let cities = string_column(&batch, "city")?;
            let sources = string_column(&batch, "source")?;
            let statuses = string_column(&batch, "status")?;
            let timestamps = batch
                .column_by_name("timestamp")
                .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
                .ok_or_else(|| invalid_column("timestamp"))?;
            let metrics = Metric::ALL
                .iter()
                .map(|m| {
                    batch
                        .column_by_name(m.name())
                        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                        .ok_or_else(|| invalid_column(m.name()))
                })
                .collect::<Result<Vec<_>>>()?;

            for i in 0..batch.num_rows() {
                if limit > 0 && observations.len() >= limit {
                    return Ok(observations);
                }
                let timestamp = DateTime::from_timestamp_millis(timestamps.value(i))
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| invalid_column("timestamp"))?;

                let mut obs = Observation::new(cities.value(i), timestamp, sources.value(i));
                for (metric, array) in Metric::ALL.iter().zip(&metrics) {
                    let value = (!array.is_null(i)).then(|| array.value(i));
                    obs.set_value(*metric, value);
                }
                if statuses.value(i) == "invalid" {
                    obs.status = ObservationStatus::Invalid;
                }
                observations.push(obs);
            }
        }

        Ok(observations)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();
        let columns = metadata
            .file_metadata()
            .schema_descr()
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size: std::fs::metadata(path)?.len(),
            compression: self.compression,
            columns,
        })
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| invalid_column(name))
}

fn invalid_column(name: &str) -> AnalyticsError {
    AnalyticsError::InvalidFormat(format!("Missing or invalid {} column", name))
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
    pub columns: Vec<String>,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        let avg_rows = if self.row_groups > 0 {
            self.total_rows as f64 / self.row_groups as f64
        } else {
            0.0
        };
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Columns: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.columns.len(),
            self.row_groups,
            self.file_size as f64 / 1_048_576.0,
            self.compression,
            avg_rows
        )
    }
}
