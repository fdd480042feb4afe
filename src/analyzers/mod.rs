pub mod aggregation;
pub mod alerts;
pub mod extreme_events;
pub mod forecasting;
pub mod weather_analyzer;

pub use aggregation::AggregationEngine;
pub use alerts::AlertEvaluator;
pub use extreme_events::ExtremeEventDetector;
pub use forecasting::{daily_means, Arima, ArimaOrder, ForecastEngine, PredictionInterval};
pub use weather_analyzer::WeatherAnalyzer;
