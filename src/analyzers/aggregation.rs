use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::models::{
    CorrelationMatrix, Metric, ObservationRow, Period, PeriodKey, PeriodStats, RegionalRow,
    RegionalTable, TimeAggregate,
};
use crate::utils::stats;

/// Time, regional and cross-metric aggregations over cleaned series.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine;

impl AggregationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Mean/max/min/population std of `metric` for `city`, one row per period
    /// bucket that has data. Rows come out in bucket order, which for seasons
    /// is spring, summer, autumn, winter.
    pub fn time_dimension<R: ObservationRow>(
        &self,
        rows: &[R],
        city: &str,
        metric: Metric,
        period: Period,
    ) -> TimeAggregate {
        let mut buckets: BTreeMap<PeriodKey, Vec<f64>> = BTreeMap::new();
        for row in rows.iter().map(|r| r.observation()).filter(|o| o.city == city) {
            if let Some(value) = row.value(metric) {
                buckets
                    .entry(period.bucket(row.timestamp))
                    .or_default()
                    .push(value);
            }
        }

        let rows: Vec<PeriodStats> = buckets
            .into_iter()
            .filter_map(|(key, values)| period_stats(key, &values))
            .collect();

        debug!(city, metric = %metric, period = %period, buckets = rows.len(), "Time aggregation");

        TimeAggregate {
            city: city.to_string(),
            metric,
            period,
            rows,
        }
    }

    /// Mean of `metric` per (city, bucket), pivoted with one column per city.
    /// Only daily and monthly periods are supported.
    pub fn regional_dimension<R: ObservationRow>(
        &self,
        rows: &[R],
        metric: Metric,
        period: Period,
    ) -> Result<RegionalTable> {
        if period == Period::Seasonal {
            return Err(AnalyticsError::UnsupportedPeriod {
                period: period.to_string(),
                analysis: "regional analysis".to_string(),
            });
        }

        let mut cells: BTreeMap<PeriodKey, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
        let mut cities: BTreeSet<String> = BTreeSet::new();

        for obs in rows.iter().map(|r| r.observation()) {
            let Some(value) = obs.value(metric) else {
                continue;
            };
            cities.insert(obs.city.clone());
            cells
                .entry(period.bucket(obs.timestamp))
                .or_default()
                .entry(obs.city.clone())
                .or_default()
                .push(value);
        }

        let cities: Vec<String> = cities.into_iter().collect();
        let rows = cells
            .into_iter()
            .map(|(key, by_city)| RegionalRow {
                period: key,
                values: cities
                    .iter()
                    .map(|c| by_city.get(c).and_then(|v| stats::mean(v)))
                    .collect(),
            })
            .collect();

        Ok(RegionalTable {
            metric,
            period,
            cities,
            rows,
        })
    }

    /// Pearson correlation between every pair of metrics for one city, using
    /// rows where both metrics are present.
    pub fn correlation<R: ObservationRow>(&self, rows: &[R], city: &str) -> CorrelationMatrix {
        let observations: Vec<_> = rows
            .iter()
            .map(|r| r.observation())
            .filter(|o| o.city == city)
            .collect();

        if observations.is_empty() {
            return CorrelationMatrix {
                city: city.to_string(),
                metrics: Vec::new(),
                values: Vec::new(),
            };
        }

        let values = Metric::ALL
            .iter()
            .map(|&a| {
                Metric::ALL
                    .iter()
                    .map(|&b| {
                        let pairs: Vec<(f64, f64)> = observations
                            .iter()
                            .filter_map(|o| Some((o.value(a)?, o.value(b)?)))
                            .collect();
                        stats::pearson(&pairs)
                    })
                    .collect()
            })
            .collect();

        CorrelationMatrix {
            city: city.to_string(),
            metrics: Metric::ALL.to_vec(),
            values,
        }
    }
}

fn period_stats(period: PeriodKey, values: &[f64]) -> Option<PeriodStats> {
    Some(PeriodStats {
        period,
        count: values.len(),
        mean: stats::mean(values)?,
        max: values.iter().copied().reduce(f64::max)?,
        min: values.iter().copied().reduce(f64::min)?,
        std: stats::population_std(values)?,
    })
}
