use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::ResultQuery;

/// Port for the evaluation result store.
///
/// Results are written by the isolated workers; the orchestrator only reads
/// them to short-circuit evaluations and to learn the outcome of a finished
/// worker.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Whether every requested mechanism group has a stored result.
    async fn has_result(&self, query: &ResultQuery) -> Result<bool>;

    /// Outcome of the evaluation described by `query`.
    ///
    /// Returns `Ok(None)` when the evaluation ran but produced no usable
    /// outcome.
    async fn get_result(&self, query: &ResultQuery) -> Result<Option<bool>>;
}
