//! Lineage domain model.
//!
//! A lineage is the ordered chain of revisions between an ancestor boundary
//! and a descendant boundary. It is immutable after construction apart from
//! the per-revision result slots.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::revision::{EvaluationResult, Revision, RevisionId};
use crate::domain::ports::RevisionSource;

/// Upper bound on the number of parent hops followed when building a lineage
/// from a [`RevisionSource`].
pub const MAX_LINEAGE_LENGTH: usize = 1_000_000;

/// Parent/child links of one revision, by lineage index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Links {
    pub parents: Vec<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lineage {
    revisions: Vec<Revision>,
    links: Vec<Links>,
    results: Vec<EvaluationResult>,
    #[serde(skip)]
    positions: HashMap<RevisionId, usize>,
}

impl Lineage {
    /// Build a linear lineage from ids ordered ancestor first.
    ///
    /// When `targets` is given, only the listed ids (and the two boundaries)
    /// are evaluation targets; otherwise every revision is.
    pub fn from_ids(
        ids: Vec<RevisionId>,
        targets: Option<&HashSet<RevisionId>>,
    ) -> SearchResult<Self> {
        let revisions = ids
            .into_iter()
            .map(|id| {
                let evaluation_target = targets.is_none_or(|t| t.contains(&id));
                Revision {
                    id,
                    version: None,
                    evaluation_target,
                }
            })
            .collect();
        Self::from_revisions(revisions)
    }

    /// Build a linear lineage from revisions ordered ancestor first.
    pub fn from_revisions(mut revisions: Vec<Revision>) -> SearchResult<Self> {
        if revisions.len() < 2 {
            return Err(SearchError::InvalidLineage(format!(
                "a lineage needs at least two revisions, got {}",
                revisions.len()
            )));
        }

        let mut positions = HashMap::with_capacity(revisions.len());
        for (index, revision) in revisions.iter().enumerate() {
            if positions.insert(revision.id.clone(), index).is_some() {
                return Err(SearchError::InvalidLineage(format!(
                    "duplicate revision id {}",
                    revision.id
                )));
            }
        }

        // Boundaries are always evaluated.
        let last = revisions.len() - 1;
        revisions[0].evaluation_target = true;
        revisions[last].evaluation_target = true;

        let mut lineage = Self {
            links: vec![Links::default(); revisions.len()],
            results: vec![EvaluationResult::Undefined; revisions.len()],
            revisions,
            positions,
        };
        for index in 1..lineage.len() {
            lineage.add_parent(index, index - 1);
        }
        Ok(lineage)
    }

    /// Build a lineage by walking parent links from `upper` back to `lower`.
    pub fn from_source(
        source: &dyn RevisionSource,
        lower: &RevisionId,
        upper: &RevisionId,
        targets: Option<&HashSet<RevisionId>>,
    ) -> SearchResult<Self> {
        let mut ids = vec![upper.clone()];
        let mut current = upper.clone();
        while &current != lower {
            if ids.len() > MAX_LINEAGE_LENGTH {
                return Err(SearchError::InvalidLineage(format!(
                    "{lower} is more than {MAX_LINEAGE_LENGTH} revisions away from {upper}"
                )));
            }
            current = source.parent_of(&current).ok_or_else(|| {
                SearchError::InvalidLineage(format!("{lower} is not an ancestor of {upper}"))
            })?;
            ids.push(current.clone());
        }
        ids.reverse();
        Self::from_ids(ids, targets)
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn ancestor(&self) -> &Revision {
        &self.revisions[0]
    }

    pub fn descendant(&self) -> &Revision {
        &self.revisions[self.revisions.len() - 1]
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn get(&self, index: usize) -> Option<&Revision> {
        self.revisions.get(index)
    }

    pub fn position_of(&self, id: &RevisionId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn links(&self, index: usize) -> Option<&Links> {
        self.links.get(index)
    }

    /// Link `child` to `parent`, keeping both sides of the relation in sync.
    fn add_parent(&mut self, child: usize, parent: usize) {
        if !self.links[child].parents.contains(&parent) {
            self.links[child].parents.push(parent);
        }
        if !self.links[parent].children.contains(&child) {
            self.links[parent].children.push(child);
        }
    }

    pub fn result(&self, index: usize) -> Option<&EvaluationResult> {
        self.results.get(index)
    }

    pub fn results(&self) -> impl Iterator<Item = (&Revision, &EvaluationResult)> {
        self.revisions.iter().zip(self.results.iter())
    }

    /// Store the result of an evaluation attempt, replacing earlier attempts.
    pub fn record_result(&mut self, id: &RevisionId, result: EvaluationResult) -> SearchResult<()> {
        let index = self
            .position_of(id)
            .ok_or_else(|| SearchError::UnknownValue(id.to_string()))?;
        self.results[index] = result;
        Ok(())
    }

    pub fn processed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_undefined()).count()
    }
}
