//! Adapters implementing the domain ports.

pub mod availability;
pub mod docker;
pub mod in_memory;
pub mod revision_source;
pub mod sqlite;

pub use availability::SnapshotAvailability;
pub use docker::DockerCliRuntime;
pub use in_memory::InMemoryResultStore;
pub use revision_source::{ChangesetListSource, CommitPositionSource};
pub use sqlite::SqliteResultStore;
