pub mod constants;
pub mod filename;
pub mod progress;
pub mod stats;

pub use constants::*;
pub use filename::{cleaning_report_paths, generate_default_parquet_filename};
pub use progress::ProgressReporter;
