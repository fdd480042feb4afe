/// Required input columns
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "timestamp",
    "city",
    "temperature",
    "pressure",
    "humidity",
    "precipitation",
    "wind_speed",
    "wind_direction",
    "source",
];

/// Accepted timestamp layouts, tried in order
pub const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Source label used when a batch has no single source
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Outlier detection
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;

/// Missing-value imputation
pub const DEFAULT_KNN_NEIGHBORS: usize = 5;

/// Forecasting defaults
pub const DEFAULT_MIN_FORECAST_OBSERVATIONS: usize = 10;
pub const DEFAULT_FORECAST_HORIZON: usize = 3;
pub const MAX_FORECAST_HORIZON: usize = 3650;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const PRIMARY_ARIMA_ORDER: (usize, usize, usize) = (2, 1, 1);
pub const FALLBACK_ARIMA_ORDER: (usize, usize, usize) = (1, 1, 0);

/// Alerting defaults
pub const DEFAULT_ALERT_WINDOW_HOURS: i64 = 24;
pub const MAX_ALERT_WINDOW_HOURS: i64 = 24 * 366 * 10;
pub const DEFAULT_HIGH_SEVERITY_RATIO: f64 = 0.1;

/// Processing defaults
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Report file prefixes
pub const CLEANING_REPORT_PREFIX: &str = "data_cleaning_report";
pub const CLEANING_SUMMARY_PREFIX: &str = "data_cleaning_summary";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
