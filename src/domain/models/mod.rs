pub mod config;
pub mod lineage;
pub mod params;
pub mod revision;
pub mod sequence_element;

pub use config::{
    AvailabilityConfig, Config, DispatcherConfig, LoggingConfig, ResultsConfig, SearchConfig,
};
pub use lineage::{Lineage, Links};
pub use params::{BrowserConfigOption, EvalParams, ResultQuery, WorkerParams};
pub use revision::{EvaluationResult, Revision, RevisionId};
pub use sequence_element::{ElementSnapshot, ElementState, SearchValue, SequenceElement};
