//! Fixed sampling followed by adaptive search.
//!
//! The sampling pass spreads evaluations over the whole range. Once it is
//! exhausted and its outcomes are in, the adaptive search takes over inside
//! the narrowest bracket the samples still leave open: the first pair of
//! adjacent samples that disagree or, without one, the stretch toward
//! whichever end of the range has no known outcome.

use async_trait::async_trait;
use tracing::info;

use crate::domain::errors::SearchResult;
use crate::domain::models::{ElementState, SearchValue};

use super::{NArySearch, NArySequence, NextStep, SearchStrategy, SequenceState};

enum Phase<T: SearchValue> {
    Sampling(NArySequence<T>),
    Searching(NArySearch<T>),
    Finished(SequenceState<T>),
}

pub struct CompositeSearch<T: SearchValue> {
    phase: Phase<T>,
    branching_factor: usize,
}

/// Bracket the adaptive search starts from, or `None` when both ends of the
/// range were sampled with the same outcome and nothing differs in between.
fn seed_bracket<T: SearchValue>(state: &SequenceState<T>) -> Option<(usize, usize)> {
    let last = state.len().saturating_sub(1);
    let mut first: Option<usize> = None;
    let mut previous: Option<(usize, bool)> = None;
    for element in state.elements() {
        if element.state() != ElementState::Done {
            continue;
        }
        let Some(outcome) = element.outcome() else {
            continue;
        };
        if let Some((index, before)) = previous {
            if before != outcome {
                return Some((index, element.index()));
            }
        }
        first.get_or_insert(element.index());
        previous = Some((element.index(), outcome));
    }

    match (first, previous) {
        (Some(first), Some((last_known, _))) => match (first == 0, last_known == last) {
            (true, true) => None,
            (true, false) => Some((last_known, last)),
            (false, true) => Some((0, first)),
            (false, false) => Some((0, last)),
        },
        _ => Some((0, last)),
    }
}

impl<T: SearchValue> CompositeSearch<T> {
    pub fn new(state: SequenceState<T>, branching_factor: usize, sequence_limit: usize) -> Self {
        Self {
            phase: Phase::Sampling(NArySequence::new(state, branching_factor, sequence_limit)),
            branching_factor,
        }
    }

    /// Whether the adaptive phase has been entered.
    pub fn is_searching(&self) -> bool {
        matches!(self.phase, Phase::Searching(_))
    }

    fn hand_over(&mut self) {
        let Phase::Sampling(sequence) = &mut self.phase else {
            return;
        };
        let state = sequence.take_state();
        self.phase = match seed_bracket(&state) {
            Some((low, high)) => {
                info!(low, high, "sampling done, searching inside bracket");
                Phase::Searching(NArySearch::with_frontier(
                    state,
                    self.branching_factor,
                    low,
                    high,
                ))
            }
            None => {
                info!("sampling found no transition");
                Phase::Finished(state)
            }
        };
    }
}

#[async_trait]
impl<T: SearchValue> SearchStrategy<T> for CompositeSearch<T> {
    fn name(&self) -> &'static str {
        "comp_search"
    }

    async fn next(&mut self) -> SearchResult<NextStep<T>> {
        loop {
            match &mut self.phase {
                Phase::Sampling(sequence) => match sequence.next().await? {
                    NextStep::Exhausted if sequence.state().has_outstanding() => {
                        return Ok(NextStep::AwaitOutcomes);
                    }
                    NextStep::Exhausted => self.hand_over(),
                    step => return Ok(step),
                },
                Phase::Searching(search) => return search.next().await,
                Phase::Finished(_) => return Ok(NextStep::Exhausted),
            }
        }
    }

    fn update_outcome(&mut self, value: &T, outcome: Option<bool>) -> SearchResult<()> {
        match &mut self.phase {
            Phase::Sampling(s) => s.update_outcome(value, outcome),
            Phase::Searching(s) => s.update_outcome(value, outcome),
            Phase::Finished(state) => state.update_outcome(value, outcome),
        }
    }

    fn state(&self) -> &SequenceState<T> {
        match &self.phase {
            Phase::Sampling(s) => s.state(),
            Phase::Searching(s) => s.state(),
            Phase::Finished(state) => state,
        }
    }

    fn frontier(&self) -> Option<(usize, usize)> {
        match &self.phase {
            Phase::Searching(s) => s.frontier(),
            _ => None,
        }
    }
}
