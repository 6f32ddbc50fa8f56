//! Sequence element domain model.
//!
//! Wraps one value of an ordered search space with its evaluation lifecycle
//! and a memoized availability answer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use tokio::sync::OnceCell;

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::revision::Revision;
use crate::domain::ports::AvailabilityOracle;

/// Values a search strategy can operate on.
pub trait SearchValue:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Whether fixed-sampling strategies may visit this value.
    fn is_evaluation_target(&self) -> bool {
        true
    }
}

impl SearchValue for Revision {
    fn is_evaluation_target(&self) -> bool {
        self.evaluation_target
    }
}

macro_rules! plain_search_value {
    ($($ty:ty),*) => {
        $(impl SearchValue for $ty {})*
    };
}

plain_search_value!(u32, u64, usize, i32, i64, String);

/// Lifecycle state of a sequence element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    #[default]
    Initialized,
    Unavailable,
    InProgress,
    Error,
    Done,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Unavailable => "unavailable",
            Self::InProgress => "in_progress",
            Self::Error => "error",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Initialized | Self::Unavailable)
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable state of one element, used to resume a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot<T> {
    pub value: T,
    pub state: ElementState,
    pub outcome: Option<bool>,
}

#[derive(Debug)]
pub struct SequenceElement<T> {
    index: usize,
    value: T,
    state: ElementState,
    outcome: Option<bool>,
    availability: OnceCell<bool>,
}

impl<T: SearchValue> SequenceElement<T> {
    pub fn new(index: usize, value: T) -> Self {
        Self {
            index,
            value,
            state: ElementState::Initialized,
            outcome: None,
            availability: OnceCell::new(),
        }
    }

    /// Restore an element from a snapshot taken in an earlier run.
    ///
    /// Elements that were in progress are reset: their worker did not
    /// survive the restart.
    pub fn from_snapshot(index: usize, snapshot: ElementSnapshot<T>) -> SearchResult<Self> {
        match (snapshot.state, snapshot.outcome) {
            (ElementState::Done, None) => {
                return Err(SearchError::InvalidPriorElements(format!(
                    "{} is done but has no outcome",
                    snapshot.value
                )));
            }
            (state, Some(_)) if state != ElementState::Done => {
                return Err(SearchError::InvalidPriorElements(format!(
                    "{} has an outcome but is {state}",
                    snapshot.value
                )));
            }
            _ => {}
        }

        let state = match snapshot.state {
            ElementState::InProgress => ElementState::Initialized,
            other => other,
        };
        let availability = match state {
            ElementState::Unavailable => OnceCell::new_with(Some(false)),
            _ => OnceCell::new(),
        };

        Ok(Self {
            index,
            value: snapshot.value,
            state,
            outcome: snapshot.outcome,
            availability,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn state(&self) -> ElementState {
        self.state
    }

    pub fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_dispatchable(&self) -> bool {
        self.state.is_dispatchable()
    }

    /// Availability answer if the oracle has been consulted already.
    pub fn cached_availability(&self) -> Option<bool> {
        self.availability.get().copied()
    }

    /// Ask the oracle at most once whether this element can be evaluated.
    pub async fn is_available(&self, oracle: &dyn AvailabilityOracle<T>) -> bool {
        *self
            .availability
            .get_or_init(|| oracle.is_available(&self.value))
            .await
    }

    /// Record that no binary could be obtained. Informational only.
    pub fn mark_unavailable(&mut self) {
        if self.state == ElementState::Initialized {
            self.state = ElementState::Unavailable;
        }
    }

    pub fn mark_in_progress(&mut self) -> SearchResult<()> {
        if !self.state.is_dispatchable() {
            return Err(SearchError::AlreadyDispatched {
                value: self.value.to_string(),
                state: self.state.to_string(),
            });
        }
        self.state = ElementState::InProgress;
        Ok(())
    }

    /// Record the outcome of an evaluation. `None` marks the evaluation as
    /// failed, which is terminal as well.
    pub fn update_outcome(&mut self, outcome: Option<bool>) -> SearchResult<()> {
        if self.state.is_terminal() {
            return Err(SearchError::AlreadyEvaluated {
                value: self.value.to_string(),
                state: self.state.to_string(),
            });
        }
        match outcome {
            Some(outcome) => {
                self.state = ElementState::Done;
                self.outcome = Some(outcome);
            }
            None => {
                self.state = ElementState::Error;
                self.outcome = None;
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ElementSnapshot<T> {
        ElementSnapshot {
            value: self.value.clone(),
            state: self.state,
            outcome: self.outcome,
        }
    }
}

impl<T: fmt::Display> fmt::Display for SequenceElement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.value, self.state.as_str())
    }
}
