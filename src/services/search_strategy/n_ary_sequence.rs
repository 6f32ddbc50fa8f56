//! Fixed sampling over the sequence.
//!
//! The range is divided into `N` equal parts, then each part again, level by
//! level, so that an early stop still leaves the samples evenly spread. The
//! outcomes do not influence what is picked.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::{ElementState, SearchValue, SequenceElement};

use super::{NextStep, SearchStrategy, SequenceState};

pub struct NArySequence<T: SearchValue> {
    state: SequenceState<T>,
    branching_factor: usize,
    limit: usize,
    issued: usize,
    started: bool,
    ready: VecDeque<usize>,
    intervals: VecDeque<(usize, usize)>,
}

/// Candidates of the fixed sampling pass: evaluation targets that were not
/// dispatched yet, or that already carry an outcome from an earlier run.
fn is_sample_candidate<T: SearchValue>(element: &SequenceElement<T>) -> bool {
    element.value().is_evaluation_target()
        && (element.is_dispatchable() || element.state() == ElementState::Done)
}

impl<T: SearchValue> NArySequence<T> {
    pub fn new(state: SequenceState<T>, branching_factor: usize, limit: usize) -> Self {
        Self {
            state,
            branching_factor: branching_factor.max(2),
            limit,
            issued: 0,
            started: false,
            ready: VecDeque::new(),
            intervals: VecDeque::new(),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Hand the elements to a follow-up strategy. The sequence is left
    /// empty and must not be driven afterwards.
    pub(crate) fn take_state(&mut self) -> SequenceState<T> {
        self.state.take()
    }

    async fn seed_boundaries(&mut self) -> SearchResult<()> {
        let len = self.state.len();
        let first = match self
            .state
            .closest_where(0, 0..len, is_sample_candidate)
            .await
        {
            Ok(index) => index,
            Err(SearchError::NoAvailableRevision { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.ready.push_back(first);

        match self
            .state
            .closest_where(len - 1, first + 1..len, is_sample_candidate)
            .await
        {
            Ok(last) => {
                self.ready.push_back(last);
                self.intervals.push_back((first, last));
            }
            Err(SearchError::NoAvailableRevision { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Split the interval `(low, high)` into `N` parts and queue the
    /// available points nearest to the split positions.
    async fn subdivide(&mut self, low: usize, high: usize) -> SearchResult<()> {
        let n = self.branching_factor;
        let span = high - low;
        let mut chosen: Vec<usize> = Vec::with_capacity(n - 1);

        for k in 1..n {
            let target = low + k * span / n;
            if target <= low || target >= high {
                continue;
            }
            let reserved: HashSet<usize> = chosen.iter().copied().collect();
            match self
                .state
                .closest_where(target, low + 1..high, |e| {
                    is_sample_candidate(e) && !reserved.contains(&e.index())
                })
                .await
            {
                Ok(index) => chosen.push(index),
                Err(SearchError::NoAvailableRevision { .. }) => break,
                Err(e) => return Err(e),
            }
        }

        chosen.sort_unstable();
        debug!(low, high, ?chosen, "subdivided interval");

        let mut previous = low;
        for &index in &chosen {
            self.ready.push_back(index);
            self.intervals.push_back((previous, index));
            previous = index;
        }
        if !chosen.is_empty() {
            self.intervals.push_back((previous, high));
        }
        Ok(())
    }
}

#[async_trait]
impl<T: SearchValue> SearchStrategy<T> for NArySequence<T> {
    fn name(&self) -> &'static str {
        "bin_seq"
    }

    async fn next(&mut self) -> SearchResult<NextStep<T>> {
        if !self.started {
            self.started = true;
            self.seed_boundaries().await?;
        }

        loop {
            if self.issued >= self.limit {
                return Ok(NextStep::Exhausted);
            }
            if let Some(index) = self.ready.pop_front() {
                // Done elements restored from an earlier run only shape the
                // intervals.
                if !self.state.element(index).is_dispatchable() {
                    continue;
                }
                let value = self.state.dispatch(index)?;
                self.issued += 1;
                return Ok(NextStep::Evaluate(value));
            }
            let Some((low, high)) = self.intervals.pop_front() else {
                return Ok(NextStep::Exhausted);
            };
            if high - low > 1 {
                self.subdivide(low, high).await?;
            }
        }
    }

    fn update_outcome(&mut self, value: &T, outcome: Option<bool>) -> SearchResult<()> {
        self.state.update_outcome(value, outcome)
    }

    fn state(&self) -> &SequenceState<T> {
        &self.state
    }
}
