pub mod imputation;
pub mod integrity_checker;
pub mod outliers;
pub mod parallel_processor;
pub mod quality_processor;
pub mod transforms;

pub use integrity_checker::{
    IntegrityChecker, IntegrityReport, MetricStatistics, Violation, ViolationType,
};
pub use outliers::{IqrDetection, OutlierBounds, OutlierDetector};
pub use parallel_processor::{CityOutcome, ParallelProcessor};
pub use quality_processor::{MissingMethod, OutlierMethod, PreprocessOutcome, QualityProcessor};
