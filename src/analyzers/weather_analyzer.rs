use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::analyzers::{AggregationEngine, AlertEvaluator, ExtremeEventDetector, ForecastEngine};
use crate::config::EngineConfig;
use crate::models::{
    AlertRecord, AlertRule, CorrelationMatrix, ExtremeEventRecord, ForecastResult, Metric,
    Observation, Period, RegionalTable, TimeAggregate, TimeRange,
};
use crate::readers::ObservationSource;

/// Entry point for the analytics operations. Each operation fetches its rows
/// from the source and hands them to the matching engine. Failures are logged
/// and come back as empty results (or a failed forecast), never as errors.
pub struct WeatherAnalyzer<S: ObservationSource> {
    source: S,
    aggregation: AggregationEngine,
    extremes: ExtremeEventDetector,
    forecaster: ForecastEngine,
    alerts: AlertEvaluator,
}

impl<S: ObservationSource> WeatherAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            aggregation: AggregationEngine::new(),
            extremes: ExtremeEventDetector::new(),
            forecaster: ForecastEngine::new(),
            alerts: AlertEvaluator::new(),
        }
    }

    pub fn from_config(source: S, config: &EngineConfig) -> Self {
        Self {
            source,
            aggregation: AggregationEngine::new(),
            extremes: ExtremeEventDetector::new(),
            forecaster: ForecastEngine::from_config(&config.forecast),
            alerts: AlertEvaluator::from_config(&config.alerts),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn load(&self, city: Option<&str>, range: Option<TimeRange>, operation: &str) -> Vec<Observation> {
        match self.source.fetch(city, range) {
            Ok(rows) => rows,
            Err(e) => {
                error!(operation, city = city.unwrap_or("*"), "Failed to fetch observations: {}", e);
                Vec::new()
            }
        }
    }

    pub fn time_dimension_analysis(&self, city: &str, metric: Metric, period: Period) -> TimeAggregate {
        let rows = self.load(Some(city), None, "time_dimension_analysis");
        self.aggregation.time_dimension(&rows, city, metric, period)
    }

    /// Compare `metric` across every city the source knows about.
    /// Seasonal periods are not supported here and yield an empty table.
    pub fn regional_dimension_analysis(&self, metric: Metric, period: Period) -> RegionalTable {
        let rows = self.load(None, None, "regional_dimension_analysis");
        match self.aggregation.regional_dimension(&rows, metric, period) {
            Ok(table) => table,
            Err(e) => {
                error!(metric = %metric, period = %period, "Regional analysis failed: {}", e);
                RegionalTable {
                    metric,
                    period,
                    cities: Vec::new(),
                    rows: Vec::new(),
                }
            }
        }
    }

    pub fn correlation_analysis(&self, city: &str) -> CorrelationMatrix {
        let rows = self.load(Some(city), None, "correlation_analysis");
        self.aggregation.correlation(&rows, city)
    }

    pub fn identify_extreme_events(
        &self,
        city: &str,
        range: Option<TimeRange>,
    ) -> Vec<ExtremeEventRecord> {
        let rows = self.load(Some(city), range, "identify_extreme_events");
        let events = self.extremes.detect(&rows, range);
        info!(city, count = events.len(), "Extreme event scan complete");
        events
    }

    /// Forecast the daily mean of `metric`. `None` uses the configured horizon.
    pub fn arima_forecast(&self, city: &str, metric: Metric, horizon: Option<usize>) -> ForecastResult {
        let rows = match self.source.fetch(Some(city), None) {
            Ok(rows) => rows,
            Err(e) => {
                error!(city, metric = %metric, "Failed to fetch observations: {}", e);
                return ForecastResult::failure(e.to_string());
            }
        };
        let horizon = horizon.unwrap_or_else(|| self.forecaster.default_horizon());
        self.forecaster.forecast(&rows, city, metric, horizon)
    }

    pub fn check_weather_alerts(
        &self,
        city: &str,
        rules: &BTreeMap<Metric, AlertRule>,
        now: NaiveDateTime,
    ) -> Vec<AlertRecord> {
        let window = TimeRange::new(Some(now - self.alerts.window()), Some(now));
        let rows = self.load(Some(city), Some(window), "check_weather_alerts");
        let alerts = self.alerts.evaluate(&rows, city, rules, now);
        if !alerts.is_empty() {
            info!(city, count = alerts.len(), "Weather alerts triggered");
        }
        alerts
    }
}
