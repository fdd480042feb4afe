use crate::config::EngineConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::{DataKind, Observation};
use crate::processors::{IntegrityChecker, PreprocessOutcome, QualityProcessor};
use crate::utils::progress::ProgressReporter;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Pipeline result for one city. Failures stay local to their city.
#[derive(Debug)]
pub struct CityOutcome {
    pub city: String,
    pub result: Result<PreprocessOutcome>,
}

/// Runs the quality pipeline for many cities on a rayon pool.
///
/// Each city's series is processed independently; nothing is shared between
/// cities except the read-only processor settings.
pub struct ParallelProcessor {
    max_workers: usize,
    kind: DataKind,
    pre_validate: bool,
    quality: QualityProcessor,
}

impl ParallelProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            kind: DataKind::default(),
            pre_validate: false,
            quality: QualityProcessor::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_workers: config.processing.max_workers,
            kind: DataKind::default(),
            pre_validate: false,
            quality: QualityProcessor::from_config(&config.quality),
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_data_kind(mut self, kind: DataKind) -> Self {
        self.kind = kind;
        self
    }

    /// Run range validation and standardization before the pipeline.
    pub fn with_pre_validation(mut self, pre_validate: bool) -> Self {
        self.pre_validate = pre_validate;
        self
    }

    /// Split a mixed batch into per-city series, ordered by city name.
    pub fn group_by_city(observations: Vec<Observation>) -> BTreeMap<String, Vec<Observation>> {
        let mut by_city: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for obs in observations {
            by_city.entry(obs.city.clone()).or_default().push(obs);
        }
        by_city
    }

    /// Process each city's series in parallel. The outer error is only
    /// returned when the worker pool cannot be built.
    pub fn process_cities(
        &self,
        batches: BTreeMap<String, Vec<Observation>>,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<CityOutcome>> {
        let total_cities = batches.len();
        let processed_count = Arc::new(AtomicUsize::new(0));

        if let Some(p) = progress {
            p.set_message(&format!("Processing {} cities...", total_cities));
        }

        // Configure Rayon thread pool
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| AnalyticsError::Config(e.to_string()))?;

        let batches: Vec<(String, Vec<Observation>)> = batches.into_iter().collect();

        let outcomes: Vec<CityOutcome> = pool.install(|| {
            batches
                .par_iter()
                .map(|(city, observations)| {
                    let result = self.process_single_city(observations);
                    if let Err(e) = &result {
                        warn!(city = %city, "City pipeline failed: {}", e);
                    }

                    // Update progress
                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(p) = progress {
                        p.update(count as u64);
                    }

                    CityOutcome {
                        city: city.clone(),
                        result,
                    }
                })
                .collect()
        });

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(cities = total_cities, failed, "Parallel preprocessing finished");

        if let Some(p) = progress {
            p.finish_with_message(&format!("Processed {} cities", total_cities));
        }

        Ok(outcomes)
    }

    fn process_single_city(&self, observations: &[Observation]) -> Result<PreprocessOutcome> {
        if self.pre_validate {
            let (standardized, _report) =
                IntegrityChecker::new().validate_and_standardize(observations)?;
            self.quality.preprocess(&standardized, self.kind)
        } else {
            self.quality.preprocess(observations, self.kind)
        }
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(city: &str, n: i64) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let mut obs = Observation::new(city, start + Duration::hours(i), "Meteostat");
                obs.temperature = Some(15.0 + (i % 4) as f64);
                obs.humidity = if i == 2 { None } else { Some(55.0 + (i % 3) as f64) };
                obs
            })
            .collect()
    }

    #[test]
    fn test_group_by_city() {
        let mut rows = series("chengdu", 3);
        rows.extend(series("beijing", 2));
        let grouped = ParallelProcessor::group_by_city(rows);
        let cities: Vec<&String> = grouped.keys().collect();
        assert_eq!(cities, vec!["beijing", "chengdu"]);
        assert_eq!(grouped["chengdu"].len(), 3);
    }

    #[test]
    fn test_cities_are_processed_independently() {
        let mut rows = series("beijing", 24);
        rows.extend(series("guangzhou", 12));
        let mut bad = series("shanghai", 2);
        bad[0].source = String::new();
        rows.extend(bad);

        let outcomes = ParallelProcessor::new(2)
            .process_cities(ParallelProcessor::group_by_city(rows), None)
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        let beijing = outcomes.iter().find(|o| o.city == "beijing").unwrap();
        let batch = &beijing.result.as_ref().unwrap().batch;
        assert_eq!(batch.len(), 24);
        assert!(batch.records.iter().all(|r| r.observation.city == "beijing"));

        let shanghai = outcomes.iter().find(|o| o.city == "shanghai").unwrap();
        assert!(shanghai.result.is_err());
    }

    #[test]
    fn test_pre_validation_drops_out_of_range_values() {
        let mut rows = series("shenzhen", 10);
        rows[4].temperature = Some(99.0);
        let outcomes = ParallelProcessor::new(1)
            .with_pre_validation(true)
            .process_cities(ParallelProcessor::group_by_city(rows), None)
            .unwrap();

        let outcome = outcomes[0].result.as_ref().unwrap();
        // forward-filled from the previous hour by standardization
        assert_eq!(outcome.batch.records[4].observation.temperature, Some(18.0));
    }
}
