//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: defaults, project YAML files
//! and `BCI_*` environment overrides, validated after merging.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, MAX_CONCURRENCY};
