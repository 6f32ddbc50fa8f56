use crate::domain::models::RevisionId;

/// Capability interface a browser's version control exposes to lineage
/// construction.
pub trait RevisionSource: Send + Sync {
    /// Immediate predecessor of `id`, or `None` if `id` is unknown or a root.
    fn parent_of(&self, id: &RevisionId) -> Option<RevisionId>;
}
