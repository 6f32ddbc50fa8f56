//! Domain layer for the bisection engine
//!
//! This module contains the core models (revisions, lineages, sequence
//! elements, evaluation parameters), the port traits through which external
//! collaborators are reached, and the domain error types.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DispatchError, DispatchResult, SearchError, SearchResult};
