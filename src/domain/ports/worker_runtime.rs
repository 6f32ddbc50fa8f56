use async_trait::async_trait;

use crate::domain::errors::DispatchResult;

/// Port for the runtime that hosts isolated evaluation workers.
///
/// The reference adapter drives Docker containers, tests use an in-process
/// fake.
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    /// Number of worker units currently running, including ones this process
    /// did not start.
    async fn running_count(&self) -> DispatchResult<usize>;

    /// Force-remove every unit named `name`. Returns how many were found.
    async fn remove_stale(&self, name: &str) -> DispatchResult<usize>;

    /// Launch a unit named `name` with `args` and wait until it has exited
    /// and been removed.
    async fn run(&self, name: &str, args: &[String]) -> DispatchResult<()>;
}
