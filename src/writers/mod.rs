pub mod cleaning_report;
pub mod export;
pub mod parquet_writer;

pub use cleaning_report::{CleaningReportPaths, CleaningReportWriter};
pub use export::{ExportFormat, Exporter, Tabular};
pub use parquet_writer::{ParquetFileInfo, ParquetWriter};
