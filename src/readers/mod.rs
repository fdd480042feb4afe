pub mod concurrent_reader;
pub mod observation_reader;
pub mod source;

pub use concurrent_reader::ConcurrentReader;
pub use observation_reader::{parse_timestamp, ObservationReader};
pub use source::{InMemorySource, ObservationSource};
