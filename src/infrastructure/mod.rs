//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//!
//! Port implementations live in `crate::adapters`.

pub mod config;
pub mod logging;
