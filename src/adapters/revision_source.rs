//! Revision sources used to build lineages.

use std::collections::{HashMap, HashSet};

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::RevisionId;
use crate::domain::ports::RevisionSource;

/// Linear history of numeric commit positions: the parent of `n` is `n - 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitPositionSource;

impl RevisionSource for CommitPositionSource {
    fn parent_of(&self, id: &RevisionId) -> Option<RevisionId> {
        id.as_position()
            .and_then(|position| position.checked_sub(1))
            .map(RevisionId::Position)
    }
}

/// Explicit ordered list of revisions, oldest first.
#[derive(Debug, Clone)]
pub struct ChangesetListSource {
    parents: HashMap<RevisionId, RevisionId>,
    first: Option<RevisionId>,
    last: Option<RevisionId>,
}

impl ChangesetListSource {
    pub fn new(ids: Vec<RevisionId>) -> SearchResult<Self> {
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(*id)) {
            return Err(SearchError::InvalidLineage(format!(
                "revision {duplicate} is listed twice"
            )));
        }
        let parents = ids
            .windows(2)
            .map(|pair| (pair[1].clone(), pair[0].clone()))
            .collect();
        Ok(Self {
            parents,
            first: ids.first().cloned(),
            last: ids.last().cloned(),
        })
    }

    /// Parse one id per line, skipping blank lines and `#` comments.
    pub fn parse(text: &str) -> SearchResult<Self> {
        let ids = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::parse)
            .collect::<SearchResult<Vec<RevisionId>>>()?;
        Self::new(ids)
    }

    pub fn first(&self) -> Option<&RevisionId> {
        self.first.as_ref()
    }

    pub fn last(&self) -> Option<&RevisionId> {
        self.last.as_ref()
    }
}

impl RevisionSource for ChangesetListSource {
    fn parent_of(&self, id: &RevisionId) -> Option<RevisionId> {
        self.parents.get(id).cloned()
    }
}
