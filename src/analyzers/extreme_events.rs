use tracing::debug;

use crate::models::{
    ExtremeEventRecord, ExtremeRule, MetricSnapshot, ObservationRow, TimeRange, EXTREME_RULES,
};

/// Scans a series against the fixed extreme-weather rule table.
#[derive(Debug, Clone)]
pub struct ExtremeEventDetector {
    rules: Vec<ExtremeRule>,
}

impl ExtremeEventDetector {
    pub fn new() -> Self {
        Self {
            rules: EXTREME_RULES.to_vec(),
        }
    }

    pub fn with_rules(rules: Vec<ExtremeRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ExtremeRule] {
        &self.rules
    }

    /// One record per (row, matching rule), sorted by timestamp. Rows outside
    /// `range` are ignored.
    pub fn detect<R: ObservationRow>(
        &self,
        rows: &[R],
        range: Option<TimeRange>,
    ) -> Vec<ExtremeEventRecord> {
        let mut events = Vec::new();

        for rule in &self.rules {
            for obs in rows.iter().map(|r| r.observation()) {
                if range.is_some_and(|r| !r.contains(obs.timestamp)) {
                    continue;
                }
                let Some(value) = obs.value(rule.metric) else {
                    continue;
                };
                if rule.matches(value) {
                    events.push(ExtremeEventRecord {
                        event_type: rule.kind,
                        city: obs.city.clone(),
                        timestamp: obs.timestamp,
                        metric: rule.metric,
                        value,
                        threshold: rule.threshold,
                        operator: rule.operator,
                        snapshot: MetricSnapshot::from(obs),
                    });
                }
            }
        }

        // Stable, so events sharing a timestamp keep rule-table order
        events.sort_by_key(|e| e.timestamp);
        debug!(count = events.len(), "Extreme events detected");
        events
    }
}

impl Default for ExtremeEventDetector {
    fn default() -> Self {
        Self::new()
    }
}
