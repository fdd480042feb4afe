pub mod aggregates;
pub mod analysis;
pub mod cleaned;
pub mod cleaning_log;
pub mod observation;
pub mod rules;

pub use aggregates::{
    CorrelationMatrix, Period, PeriodKey, PeriodStats, RegionalRow, RegionalTable, Season,
    TimeAggregate,
};
pub use analysis::{
    AlertRecord, AlertRule, AlertSeverity, ExtremeEventRecord, ForecastPoint, ForecastResult,
    MetricSnapshot,
};
pub use cleaned::{CleanedBatch, CleanedRecord, DataKind, TimeParts};
pub use cleaning_log::{CleaningLog, CleaningLogEntry, CleaningSummaryRow, ProcessType};
pub use observation::{Metric, Observation, ObservationBuilder, ObservationRow, ObservationStatus, TimeRange};
pub use rules::{Comparison, ExtremeEventKind, ExtremeRule, MetricRule, EXTREME_RULES, METRIC_RULES};
