//! BCI - browser change inspector
//!
//! Locates the revision of a browser's history where an observable behavior
//! changed. Revisions are evaluated by isolated workers, dispatched with
//! bounded concurrency, and the search narrows the range from their
//! outcomes.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): revisions, lineages, search elements, ports
//! - **Service Layer** (`services`): search strategies, worker dispatcher,
//!   orchestration loop
//! - **Adapters** (`adapters`): Docker, SQLite, snapshot availability
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```
//! use bci::domain::models::{Lineage, RevisionId};
//!
//! let ids = (100..110).map(RevisionId::Position).collect();
//! let lineage = Lineage::from_ids(ids, None).unwrap();
//! assert_eq!(lineage.len(), 10);
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DispatchError, SearchError};
pub use domain::models::{Config, EvalParams, EvaluationResult, Lineage, Revision, RevisionId};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{SearchOrchestrator, SearchReport, StrategyKind, WorkerDispatcher};
