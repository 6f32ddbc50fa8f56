//! Search strategies over a partially available ordered sequence.
//!
//! A strategy decides which value of the sequence should be evaluated next,
//! given the outcomes reported so far:
//!
//! - [`NArySequence`]: outcome-independent sampling spread over the range
//! - [`NArySearch`]: adaptive bisection generalized to `N` branches
//! - [`CompositeSearch`]: sampling first, then bisection inside the bracket
//!
//! Every strategy owns a [`SequenceState`] holding one
//! [`SequenceElement`] per value. Only the control loop mutates it.

pub mod composite_search;
pub mod n_ary_search;
pub mod n_ary_sequence;

pub use composite_search::CompositeSearch;
pub use n_ary_search::NArySearch;
pub use n_ary_sequence::NArySequence;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::{ElementSnapshot, ElementState, SearchValue, SequenceElement};
use crate::domain::ports::AvailabilityOracle;
use crate::services::availability_resolver::closest_available_within;

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep<T> {
    /// Evaluate this value and report its outcome.
    Evaluate(T),
    /// Nothing can be scheduled until outstanding outcomes are reported.
    AwaitOutcomes,
    /// The search is complete.
    Exhausted,
}

/// Common contract of all search strategies.
#[async_trait]
pub trait SearchStrategy<T: SearchValue>: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Next value to evaluate. A returned value is never returned again.
    async fn next(&mut self) -> SearchResult<NextStep<T>>;

    /// Report the outcome of an evaluation. `None` means the evaluation
    /// failed.
    fn update_outcome(&mut self, value: &T, outcome: Option<bool>) -> SearchResult<()>;

    fn state(&self) -> &SequenceState<T>;

    /// Current `[low, high]` bracket of the transition, if one is known.
    fn frontier(&self) -> Option<(usize, usize)> {
        None
    }

    fn snapshot(&self) -> Vec<ElementSnapshot<T>> {
        self.state().snapshot()
    }
}

/// Selectable strategies, by their command line names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Sequence,
    Search,
    Composite,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "bin_seq",
            Self::Search => "bin_search",
            Self::Composite => "comp_search",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bin_seq" => Ok(Self::Sequence),
            "bin_search" => Ok(Self::Search),
            "comp_search" => Ok(Self::Composite),
            other => Err(SearchError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Build a boxed strategy of the given kind over `state`.
pub fn build_strategy<T: SearchValue>(
    kind: StrategyKind,
    state: SequenceState<T>,
    branching_factor: usize,
    sequence_limit: usize,
) -> Box<dyn SearchStrategy<T>> {
    match kind {
        StrategyKind::Sequence => Box::new(NArySequence::new(state, branching_factor, sequence_limit)),
        StrategyKind::Search => Box::new(NArySearch::new(state, branching_factor)),
        StrategyKind::Composite => {
            Box::new(CompositeSearch::new(state, branching_factor, sequence_limit))
        }
    }
}

/// Elements of a strategy plus the availability oracle they are probed with.
pub struct SequenceState<T: SearchValue> {
    elements: Vec<SequenceElement<T>>,
    positions: HashMap<T, usize>,
    oracle: Arc<dyn AvailabilityOracle<T>>,
}

impl<T: SearchValue> SequenceState<T> {
    pub fn new(values: Vec<T>, oracle: Arc<dyn AvailabilityOracle<T>>) -> SearchResult<Self> {
        let elements = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| SequenceElement::new(index, value))
            .collect();
        Self::from_elements(elements, oracle)
    }

    /// Resume from snapshots of an earlier run over the same values.
    pub fn with_prior_elements(
        values: Vec<T>,
        oracle: Arc<dyn AvailabilityOracle<T>>,
        prior: Vec<ElementSnapshot<T>>,
    ) -> SearchResult<Self> {
        if values.len() != prior.len() {
            return Err(SearchError::InvalidPriorElements(format!(
                "list of values and list of elements should be of equal length ({} != {})",
                values.len(),
                prior.len()
            )));
        }
        let elements = values
            .into_iter()
            .zip(prior)
            .enumerate()
            .map(|(index, (value, snapshot))| {
                if snapshot.value != value {
                    return Err(SearchError::InvalidPriorElements(format!(
                        "element {index} holds {} instead of {value}",
                        snapshot.value
                    )));
                }
                SequenceElement::from_snapshot(index, snapshot)
            })
            .collect::<SearchResult<Vec<_>>>()?;
        Self::from_elements(elements, oracle)
    }

    fn from_elements(
        elements: Vec<SequenceElement<T>>,
        oracle: Arc<dyn AvailabilityOracle<T>>,
    ) -> SearchResult<Self> {
        if elements.is_empty() {
            return Err(SearchError::InvalidLineage(
                "cannot search an empty sequence".to_string(),
            ));
        }
        let mut positions = HashMap::with_capacity(elements.len());
        for element in &elements {
            if positions
                .insert(element.value().clone(), element.index())
                .is_some()
            {
                return Err(SearchError::InvalidLineage(format!(
                    "duplicate value {}",
                    element.value()
                )));
            }
        }
        Ok(Self {
            elements,
            positions,
            oracle,
        })
    }

    /// Move the elements out, leaving an empty state with the same oracle.
    pub(crate) fn take(&mut self) -> Self {
        Self {
            elements: std::mem::take(&mut self.elements),
            positions: std::mem::take(&mut self.positions),
            oracle: self.oracle.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[SequenceElement<T>] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> &SequenceElement<T> {
        &self.elements[index]
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.positions.get(value).copied()
    }

    pub fn has_outstanding(&self) -> bool {
        self.elements
            .iter()
            .any(|e| e.state() == ElementState::InProgress)
    }

    /// Nearest index to `target` within `bounds` whose element passes
    /// `eligible` and is available. Elements that are already done count as
    /// available without asking the oracle.
    pub async fn closest_where<F>(
        &mut self,
        target: usize,
        bounds: Range<usize>,
        eligible: F,
    ) -> SearchResult<usize>
    where
        F: Fn(&SequenceElement<T>) -> bool + Send + Sync,
    {
        let elements = &self.elements;
        let oracle = self.oracle.as_ref();
        let eligible = &eligible;
        let result = closest_available_within(bounds, target, |index| async move {
            let element = &elements[index];
            if !eligible(element) {
                return false;
            }
            element.state() == ElementState::Done || element.is_available(oracle).await
        })
        .await;
        self.sync_unavailable();
        result
    }

    fn sync_unavailable(&mut self) {
        for element in &mut self.elements {
            if element.cached_availability() == Some(false) {
                element.mark_unavailable();
            }
        }
    }

    /// Move the element at `index` to in-progress and return its value.
    pub fn dispatch(&mut self, index: usize) -> SearchResult<T> {
        let element = &mut self.elements[index];
        element.mark_in_progress()?;
        Ok(element.value().clone())
    }

    pub fn update_outcome(&mut self, value: &T, outcome: Option<bool>) -> SearchResult<()> {
        let index = self
            .index_of(value)
            .ok_or_else(|| SearchError::UnknownValue(value.to_string()))?;
        self.elements[index].update_outcome(outcome)
    }

    pub fn snapshot(&self) -> Vec<ElementSnapshot<T>> {
        self.elements.iter().map(SequenceElement::snapshot).collect()
    }
}
