//! Revision domain model.
//!
//! A revision is one addressable point of a browser's history: a numeric
//! commit position (Chromium) or a changeset hash (Firefox).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::SearchError;

/// Opaque revision identifier.
///
/// Identifiers consisting only of digits are commit positions; anything else
/// is treated as a changeset id. Ordering between revisions of a lineage is
/// given by their position in the lineage, not by the id itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevisionId {
    Position(u64),
    Changeset(String),
}

impl RevisionId {
    pub fn as_position(&self) -> Option<u64> {
        match self {
            Self::Position(p) => Some(*p),
            Self::Changeset(_) => None,
        }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(p) => write!(f, "{p}"),
            Self::Changeset(c) => f.write_str(c),
        }
    }
}

impl FromStr for RevisionId {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SearchError::InvalidLineage(
                "revision id cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            trimmed
                .parse::<u64>()
                .map(Self::Position)
                .map_err(|e| SearchError::InvalidLineage(format!("{trimmed}: {e}")))
        } else {
            Ok(Self::Changeset(trimmed.to_string()))
        }
    }
}

impl From<u64> for RevisionId {
    fn from(position: u64) -> Self {
        Self::Position(position)
    }
}

/// One revision of a lineage. Immutable once the lineage is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    /// Human readable version tag, e.g. `"112.0.5615.49"`
    pub version: Option<String>,
    /// Whether fixed-sampling strategies may visit this revision
    pub evaluation_target: bool,
}

impl Revision {
    pub fn new(id: impl Into<RevisionId>) -> Self {
        Self {
            id: id.into(),
            version: None,
            evaluation_target: true,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} ({version})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Result slot of a revision.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum EvaluationResult {
    #[default]
    Undefined,
    Positive,
    Negative,
    BuildUnavailable,
    Error(String),
}

impl EvaluationResult {
    pub fn from_outcome(outcome: bool) -> Self {
        if outcome {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Undefined => "undefined",
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::BuildUnavailable => "build unavailable",
            Self::Error(message) => message,
        }
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}
