//! Domain errors for the bisection engine.

use thiserror::Error;

/// Errors raised by search strategies, the availability resolver and lineage
/// construction.
///
/// `UnknownValue`, `AlreadyEvaluated` and `AlreadyDispatched` are contract
/// violations: they indicate a bug in the caller and must not be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Value is not part of this sequence: {0}")]
    UnknownValue(String),

    #[error("Outcome was already recorded for {value} (state: {state})")]
    AlreadyEvaluated { value: String, state: String },

    #[error("Element {value} cannot be dispatched from state {state}")]
    AlreadyDispatched { value: String, state: String },

    #[error("Could not find an available revision close to index {target}")]
    NoAvailableRevision { target: usize },

    #[error("Invalid prior elements: {0}")]
    InvalidPriorElements(String),

    #[error("Unknown search strategy option '{0}'")]
    UnknownStrategy(String),

    #[error("Invalid lineage: {0}")]
    InvalidLineage(String),

    #[error("Invalid evaluation parameters: {0}")]
    InvalidParams(String),
}

pub type SearchResult<T> = Result<T, SearchError>;

/// Errors raised while launching or supervising an isolated worker unit.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Worker runtime command failed: {0}")]
    Runtime(String),

    #[error("Could not remove stale worker '{name}': {reason}")]
    StaleRemoval { name: String, reason: String },

    #[error("Worker '{name}' exited unsuccessfully: {status}")]
    WorkerFailed { name: String, status: String },

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
