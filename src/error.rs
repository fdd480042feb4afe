use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingField(Vec<String>),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Batch mixes cities: expected {expected}, found {found}")]
    MixedCities { expected: String, found: String },

    #[error("Insufficient data: {actual} daily observations available, at least {required} required")]
    InsufficientData { actual: usize, required: usize },

    #[error("Column {column} is degenerate: {reason}")]
    DegenerateColumn { column: String, reason: String },

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("Unsupported time period '{period}' for {analysis}")]
    UnsupportedPeriod { period: String, analysis: String },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Unknown comparison operator: {0}")]
    UnknownOperator(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
