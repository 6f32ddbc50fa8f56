//! Port trait definitions (Hexagonal Architecture)
//!
//! Interfaces the search core consumes from external collaborators:
//! - AvailabilityOracle: can a binary be obtained for a revision
//! - ResultStore: stored evaluation outcomes
//! - WorkerRuntime: isolated execution units
//! - RevisionSource: parent links used to build lineages

pub mod availability;
pub mod result_store;
pub mod revision_source;
pub mod worker_runtime;

pub use availability::{AvailabilityOracle, FnAvailability};
pub use result_store::ResultStore;
pub use revision_source::RevisionSource;
pub use worker_runtime::WorkerRuntime;
