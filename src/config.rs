use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AnalyticsError, Result};
use crate::utils::constants::*;

/// Tunables for the quality pipeline and analytics engines.
///
/// Layered: built-in defaults, then an optional TOML file, then `WEATHER__*`
/// environment variables (e.g. `WEATHER__FORECAST__HORIZON=5`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quality: QualityConfig,
    pub forecast: ForecastConfig,
    pub alerts: AlertConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub iqr_multiplier: f64,
    pub zscore_threshold: f64,
    pub knn_neighbors: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            zscore_threshold: DEFAULT_ZSCORE_THRESHOLD,
            knn_neighbors: DEFAULT_KNN_NEIGHBORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub min_observations: usize,
    pub horizon: usize,
    pub confidence_level: f64,
    pub primary_order: (usize, usize, usize),
    pub fallback_order: (usize, usize, usize),
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_observations: DEFAULT_MIN_FORECAST_OBSERVATIONS,
            horizon: DEFAULT_FORECAST_HORIZON,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            primary_order: PRIMARY_ARIMA_ORDER,
            fallback_order: FALLBACK_ARIMA_ORDER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub window_hours: i64,
    pub high_severity_ratio: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_ALERT_WINDOW_HOURS,
            high_severity_ratio: DEFAULT_HIGH_SEVERITY_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_workers: usize,
    pub chunk_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl EngineConfig {
    /// Load configuration, reading `path` when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            } else {
                return Err(AnalyticsError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        } else {
            builder = builder.add_source(File::with_name("weather-analytics").required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("WEATHER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.quality.iqr_multiplier <= 0.0 {
            return Err(AnalyticsError::Config(
                "quality.iqr_multiplier must be positive".to_string(),
            ));
        }

        if self.quality.zscore_threshold <= 0.0 {
            return Err(AnalyticsError::Config(
                "quality.zscore_threshold must be positive".to_string(),
            ));
        }

        if self.quality.knn_neighbors == 0 {
            return Err(AnalyticsError::Config(
                "quality.knn_neighbors must be at least 1".to_string(),
            ));
        }

        if !(1..=MAX_FORECAST_HORIZON).contains(&self.forecast.horizon) {
            return Err(AnalyticsError::Config(format!(
                "forecast.horizon must be between 1 and {}, got {}",
                MAX_FORECAST_HORIZON, self.forecast.horizon
            )));
        }

        if !(self.forecast.confidence_level > 0.0 && self.forecast.confidence_level < 1.0) {
            return Err(AnalyticsError::Config(format!(
                "forecast.confidence_level must be in (0, 1), got {}",
                self.forecast.confidence_level
            )));
        }

        if !(1..=MAX_ALERT_WINDOW_HOURS).contains(&self.alerts.window_hours) {
            return Err(AnalyticsError::Config(format!(
                "alerts.window_hours must be between 1 and {}, got {}",
                MAX_ALERT_WINDOW_HOURS, self.alerts.window_hours
            )));
        }

        if self.processing.chunk_size == 0 {
            return Err(AnalyticsError::Config(
                "processing.chunk_size must be at least 1".to_string(),
            ));
        }

        if self.processing.max_workers == 0 {
            return Err(AnalyticsError::Config(
                "processing.max_workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.forecast.horizon, 3);
        assert_eq!(config.forecast.primary_order, (2, 1, 1));
        assert_eq!(config.quality.knn_neighbors, 5);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[forecast]\nhorizon = 7\nconfidence_level = 0.9").unwrap();
        writeln!(file, "[quality]\niqr_multiplier = 3.0").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.forecast.horizon, 7);
        assert_eq!(config.forecast.confidence_level, 0.9);
        assert_eq!(config.quality.iqr_multiplier, 3.0);
        // untouched sections keep their defaults
        assert_eq!(config.alerts.window_hours, 24);
        assert_eq!(config.forecast.min_observations, 10);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/weather.toml")));
        assert!(matches!(result, Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_bad_confidence() {
        let mut config = EngineConfig::default();
        config.forecast.confidence_level = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.quality.knn_neighbors = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_chunk_size() {
        let mut config = EngineConfig::default();
        config.processing.chunk_size = 0;
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn test_validation_bounds_alert_window() {
        let mut config = EngineConfig::default();
        config.alerts.window_hours = i64::MAX;
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));

        config.alerts.window_hours = MAX_ALERT_WINDOW_HOURS;
        assert!(config.validate().is_ok());
    }
}
