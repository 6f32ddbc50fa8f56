//! Adaptive `N`-ary search for the transition between two outcomes.
//!
//! The frontier `[low, high]` always brackets the change: `low` carries the
//! outcome seen before the transition and `high` the first differing one.
//! Each round evaluates up to `N - 1` points inside the frontier and then
//! narrows it, so the number of rounds is logarithmic in base `N`.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::domain::errors::{SearchError, SearchResult};
use crate::domain::models::{ElementState, SearchValue, SequenceElement};

use super::{NextStep, SearchStrategy, SequenceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Low,
    High,
}

enum BoundaryStatus {
    Known,
    Evaluate(usize),
    Unreachable,
}

pub struct NArySearch<T: SearchValue> {
    state: SequenceState<T>,
    branching_factor: usize,
    low: usize,
    high: usize,
    round: Vec<usize>,
    queued: VecDeque<usize>,
    rounds: usize,
    transition: bool,
    finished: bool,
}

fn is_boundary_candidate<T: SearchValue>(element: &SequenceElement<T>) -> bool {
    element.is_dispatchable() || element.state() == ElementState::Done
}

impl<T: SearchValue> NArySearch<T> {
    pub fn new(state: SequenceState<T>, branching_factor: usize) -> Self {
        let high = state.len().saturating_sub(1);
        Self::with_frontier(state, branching_factor, 0, high)
    }

    /// Start from an already known bracket, e.g. one found by sampling.
    pub fn with_frontier(
        state: SequenceState<T>,
        branching_factor: usize,
        low: usize,
        high: usize,
    ) -> Self {
        let high = high.min(state.len().saturating_sub(1));
        Self {
            state,
            branching_factor: branching_factor.max(2),
            low: low.min(high),
            high,
            round: Vec::new(),
            queued: VecDeque::new(),
            rounds: 0,
            transition: false,
            finished: false,
        }
    }

    /// Number of split rounds started so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    fn finish(&mut self, reason: &str) -> NextStep<T> {
        if !self.finished {
            info!(
                low = self.low,
                high = self.high,
                transition = self.transition,
                rounds = self.rounds,
                reason,
                "search finished"
            );
        }
        self.finished = true;
        NextStep::Exhausted
    }

    fn issue_queued(&mut self) -> SearchResult<Option<NextStep<T>>> {
        while let Some(index) = self.queued.pop_front() {
            if self.state.element(index).is_dispatchable() {
                let value = self.state.dispatch(index)?;
                return Ok(Some(NextStep::Evaluate(value)));
            }
        }
        Ok(None)
    }

    fn round_outstanding(&self) -> bool {
        self.round
            .iter()
            .any(|&i| self.state.element(i).state() == ElementState::InProgress)
    }

    /// Make sure the given boundary sits on an element with an outcome,
    /// moving it inward past elements that cannot be evaluated.
    async fn settle(&mut self, side: Boundary) -> SearchResult<BoundaryStatus> {
        let (target, bounds) = match side {
            Boundary::Low => (self.low, self.low..self.high),
            Boundary::High => (self.high, self.low + 1..self.high + 1),
        };
        if self.state.element(target).state() == ElementState::Done {
            return Ok(BoundaryStatus::Known);
        }

        let index = match self
            .state
            .closest_where(target, bounds, is_boundary_candidate)
            .await
        {
            Ok(index) => index,
            Err(SearchError::NoAvailableRevision { .. }) => return Ok(BoundaryStatus::Unreachable),
            Err(e) => return Err(e),
        };
        if index != target {
            debug!(?side, from = target, to = index, "moved boundary");
        }
        match side {
            Boundary::Low => self.low = index,
            Boundary::High => self.high = index,
        }

        if self.state.element(index).state() == ElementState::Done {
            Ok(BoundaryStatus::Known)
        } else {
            Ok(BoundaryStatus::Evaluate(index))
        }
    }

    /// Shrink the frontier onto the first outcome change within it.
    ///
    /// Returns `false` if every known outcome equals the one at `low`.
    fn narrow(&mut self) -> bool {
        let Some(reference) = self.state.element(self.low).outcome() else {
            return false;
        };
        let mut last_same = self.low;
        for index in self.low + 1..=self.high {
            match self.state.element(index).outcome() {
                Some(outcome) if outcome != reference => {
                    self.low = last_same;
                    self.high = index;
                    return true;
                }
                Some(_) => last_same = index,
                None => {}
            }
        }
        false
    }

    async fn split_points(&mut self) -> SearchResult<Vec<usize>> {
        let n = self.branching_factor;
        let (low, high) = (self.low, self.high);
        let span = high - low;
        let mut chosen: Vec<usize> = Vec::with_capacity(n - 1);

        for k in 1..n {
            let target = (low + k * span / n).clamp(low + 1, high - 1);
            let reserved: HashSet<usize> = chosen.iter().copied().collect();
            match self
                .state
                .closest_where(target, low + 1..high, |e| {
                    e.is_dispatchable() && !reserved.contains(&e.index())
                })
                .await
            {
                Ok(index) => chosen.push(index),
                Err(SearchError::NoAvailableRevision { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        chosen.sort_unstable();
        Ok(chosen)
    }
}

#[async_trait]
impl<T: SearchValue> SearchStrategy<T> for NArySearch<T> {
    fn name(&self) -> &'static str {
        "bin_search"
    }

    async fn next(&mut self) -> SearchResult<NextStep<T>> {
        if self.finished {
            return Ok(NextStep::Exhausted);
        }
        if let Some(step) = self.issue_queued()? {
            return Ok(step);
        }
        if self.round_outstanding() {
            return Ok(NextStep::AwaitOutcomes);
        }
        self.round.clear();

        let mut boundaries = Vec::new();
        for side in [Boundary::Low, Boundary::High] {
            if self.high <= self.low {
                return Ok(self.finish("frontier collapsed"));
            }
            match self.settle(side).await? {
                BoundaryStatus::Known => {}
                BoundaryStatus::Evaluate(index) => boundaries.push(index),
                BoundaryStatus::Unreachable => {
                    return Ok(self.finish("no available boundary"));
                }
            }
        }
        if !boundaries.is_empty() {
            self.round = boundaries.clone();
            self.queued = boundaries.into();
            return Ok(self.issue_queued()?.unwrap_or(NextStep::AwaitOutcomes));
        }

        if !self.narrow() {
            warn!(
                low = self.low,
                high = self.high,
                "both boundaries share one outcome, no transition to search"
            );
            return Ok(self.finish("no transition"));
        }
        self.transition = true;
        if self.high - self.low <= 1 {
            return Ok(self.finish("adjacent boundaries"));
        }

        let points = self.split_points().await?;
        if points.is_empty() {
            return Ok(self.finish("no available element inside the frontier"));
        }
        self.rounds += 1;
        debug!(
            round = self.rounds,
            low = self.low,
            high = self.high,
            ?points,
            "starting round"
        );
        self.round = points.clone();
        self.queued = points.into();
        Ok(self.issue_queued()?.unwrap_or(NextStep::AwaitOutcomes))
    }

    fn update_outcome(&mut self, value: &T, outcome: Option<bool>) -> SearchResult<()> {
        self.state.update_outcome(value, outcome)
    }

    fn state(&self) -> &SequenceState<T> {
        &self.state
    }

    fn frontier(&self) -> Option<(usize, usize)> {
        self.transition.then_some((self.low, self.high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::FnAvailability;
    use std::sync::Arc;

    fn search(len: u32, n: usize, available: fn(&u32) -> bool) -> NArySearch<u32> {
        let state =
            SequenceState::new((0..len).collect(), Arc::new(FnAvailability::new(available))).unwrap();
        NArySearch::new(state, n)
    }

    /// Evaluate everything synchronously against `value >= boundary`.
    async fn run(strategy: &mut NArySearch<u32>, boundary: u32) -> Vec<u32> {
        let mut order = Vec::new();
        loop {
            match strategy.next().await.unwrap() {
                NextStep::Evaluate(v) => {
                    order.push(v);
                    strategy.update_outcome(&v, Some(v >= boundary)).unwrap();
                }
                NextStep::AwaitOutcomes => panic!("nothing should be outstanding"),
                NextStep::Exhausted => return order,
            }
        }
    }

    #[tokio::test]
    async fn test_binary_trace() {
        let mut strategy = search(10, 2, |_| true);
        let order = run(&mut strategy, 5).await;
        assert_eq!(order, vec![0, 9, 4, 6, 5]);
        assert_eq!(strategy.frontier(), Some((4, 5)));
    }

    #[tokio::test]
    async fn test_waits_for_round_outcomes() {
        let mut strategy = search(10, 2, |_| true);
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(0));
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(9));
        assert_eq!(strategy.next().await.unwrap(), NextStep::AwaitOutcomes);
        strategy.update_outcome(&0, Some(false)).unwrap();
        assert_eq!(strategy.next().await.unwrap(), NextStep::AwaitOutcomes);
        strategy.update_outcome(&9, Some(true)).unwrap();
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(4));
    }

    #[tokio::test]
    async fn test_quaternary_round_has_three_points() {
        let mut strategy = search(100, 4, |_| true);
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(0));
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(99));
        strategy.update_outcome(&0, Some(false)).unwrap();
        strategy.update_outcome(&99, Some(true)).unwrap();

        let mut round = Vec::new();
        while let NextStep::Evaluate(v) = strategy.next().await.unwrap() {
            round.push(v);
        }
        assert_eq!(round, vec![24, 49, 74]);
    }

    #[tokio::test]
    async fn test_no_transition_is_exhausted() {
        let mut strategy = search(10, 2, |_| true);
        let order = run(&mut strategy, 100).await;
        assert_eq!(order, vec![0, 9]);
        assert_eq!(strategy.frontier(), None);
    }

    #[tokio::test]
    async fn test_unavailable_boundary_moves_inward() {
        let mut strategy = search(10, 2, |v| *v != 0 && *v != 9);
        let order = run(&mut strategy, 5).await;
        assert_eq!(&order[..2], &[1, 8]);
        assert_eq!(strategy.frontier(), Some((4, 5)));
    }

    #[tokio::test]
    async fn test_unavailable_gap_stops_at_available_neighbours() {
        let mut strategy = search(10, 2, |v| !(3..=6).contains(v));
        run(&mut strategy, 5).await;
        assert_eq!(strategy.frontier(), Some((2, 7)));
    }

    #[tokio::test]
    async fn test_failed_boundary_is_replaced() {
        let mut strategy = search(10, 2, |_| true);
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(0));
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(9));
        strategy.update_outcome(&0, None).unwrap();
        strategy.update_outcome(&9, Some(true)).unwrap();
        assert_eq!(strategy.next().await.unwrap(), NextStep::Evaluate(1));
    }

    #[tokio::test]
    async fn test_rounds_are_logarithmic() {
        let mut strategy = search(1000, 4, |_| true);
        run(&mut strategy, 613).await;
        assert_eq!(strategy.frontier(), Some((612, 613)));
        assert!(strategy.rounds() <= 6, "took {} rounds", strategy.rounds());
    }
}
