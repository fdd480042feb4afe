use crate::error::Result;
use crate::models::{Observation, TimeRange};
use std::collections::BTreeSet;

/// Somewhere observations can be fetched from, filtered by city and time.
pub trait ObservationSource: Send + Sync {
    /// Matching observations sorted by (city, timestamp)
    fn fetch(&self, city: Option<&str>, range: Option<TimeRange>) -> Result<Vec<Observation>>;

    /// Distinct city names, sorted
    fn cities(&self) -> Result<Vec<String>>;
}

/// Observations held in memory, e.g. the output of a cleaning run.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    observations: Vec<Observation>,
}

impl InMemorySource {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn extend(&mut self, observations: impl IntoIterator<Item = Observation>) {
        self.observations.extend(observations);
    }
}

impl ObservationSource for InMemorySource {
    fn fetch(&self, city: Option<&str>, range: Option<TimeRange>) -> Result<Vec<Observation>> {
        let mut rows: Vec<Observation> = self
            .observations
            .iter()
            .filter(|o| city.map_or(true, |c| o.city == c))
            .filter(|o| range.map_or(true, |r| r.contains(o.timestamp)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.city.cmp(&b.city).then(a.timestamp.cmp(&b.timestamp)));
        Ok(rows)
    }

    fn cities(&self) -> Result<Vec<String>> {
        let cities: BTreeSet<&str> = self.observations.iter().map(|o| o.city.as_str()).collect();
        Ok(cities.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn source() -> InMemorySource {
        InMemorySource::new(vec![
            Observation::new("shanghai", base() + Duration::hours(2), "Kaggle"),
            Observation::new("beijing", base() + Duration::hours(5), "Kaggle"),
            Observation::new("beijing", base() + Duration::hours(1), "Kaggle"),
        ])
    }

    #[test]
    fn test_fetch_filters_and_sorts() {
        let source = source();
        let all = source.fetch(None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].city, "beijing");
        assert!(all[0].timestamp < all[1].timestamp);

        let beijing = source.fetch(Some("beijing"), None).unwrap();
        assert_eq!(beijing.len(), 2);

        let range = TimeRange::new(Some(base() + Duration::hours(2)), None);
        let late = source.fetch(None, Some(range)).unwrap();
        assert_eq!(late.len(), 2);
    }

    #[test]
    fn test_cities_are_distinct() {
        assert_eq!(source().cities().unwrap(), vec!["beijing", "shanghai"]);
    }
}
