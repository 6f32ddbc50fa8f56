//! Strategy behavior through the public API: selection by name, scenarios
//! over partially available sequences and resuming from snapshots.

use std::sync::Arc;

use bci::domain::errors::SearchError;
use bci::domain::models::ElementState;
use bci::domain::ports::{AvailabilityOracle, FnAvailability};
use bci::services::{
    build_strategy, closest_available, NArySearch, NextStep, SearchStrategy, SequenceState,
    StrategyKind,
};

fn oracle(available: impl Fn(u64) -> bool + Send + Sync + 'static) -> Arc<dyn AvailabilityOracle<u64>> {
    Arc::new(FnAvailability::new(move |value: &u64| available(*value)))
}

fn state(len: u64, available: impl Fn(u64) -> bool + Send + Sync + 'static) -> SequenceState<u64> {
    SequenceState::new((0..len).collect(), oracle(available)).unwrap()
}

async fn run_to_end(strategy: &mut dyn SearchStrategy<u64>, step: u64) -> Vec<u64> {
    let mut evaluated = Vec::new();
    let mut pending = Vec::new();
    loop {
        match strategy.next().await.unwrap() {
            NextStep::Evaluate(value) => pending.push(value),
            NextStep::AwaitOutcomes => {
                assert!(!pending.is_empty(), "waiting without outstanding work");
                for value in pending.drain(..) {
                    strategy.update_outcome(&value, Some(value >= step)).unwrap();
                    evaluated.push(value);
                }
            }
            NextStep::Exhausted => {
                for value in pending.drain(..) {
                    strategy.update_outcome(&value, Some(value >= step)).unwrap();
                    evaluated.push(value);
                }
                return evaluated;
            }
        }
    }
}

#[test]
fn test_strategy_names_round_trip() {
    for kind in [StrategyKind::Sequence, StrategyKind::Search, StrategyKind::Composite] {
        assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
    }
    assert!(matches!(
        "bisect".parse::<StrategyKind>(),
        Err(SearchError::UnknownStrategy(name)) if name == "bisect"
    ));
}

#[tokio::test]
async fn test_only_six_available_resolves_to_six() {
    let found = closest_available(10, 5, |i| async move { i == 6 }).await.unwrap();
    assert_eq!(found, 6);
}

#[tokio::test]
async fn test_nothing_available_is_an_error() {
    let result = closest_available(10, 5, |_| async { false }).await;
    assert!(matches!(result, Err(SearchError::NoAvailableRevision { target: 5 })));
}

#[tokio::test]
async fn test_binary_search_over_ten_values() {
    let mut strategy = build_strategy(StrategyKind::Search, state(10, |_| true), 2, 100);
    run_to_end(strategy.as_mut(), 5).await;
    assert_eq!(strategy.frontier(), Some((4, 5)));
}

#[tokio::test]
async fn test_every_strategy_skips_unavailable_values() {
    for kind in [StrategyKind::Sequence, StrategyKind::Search, StrategyKind::Composite] {
        let mut strategy = build_strategy(kind, state(30, |v| v % 3 != 1), 3, 10);
        let evaluated = run_to_end(strategy.as_mut(), 17).await;
        assert!(
            evaluated.iter().all(|v| v % 3 != 1),
            "{kind} evaluated an unavailable value: {evaluated:?}"
        );
        for element in strategy.state().elements() {
            if element.state() == ElementState::Unavailable {
                assert_eq!(element.value() % 3, 1);
            }
        }
    }
}

#[tokio::test]
async fn test_composite_ends_adjacent_around_step() {
    let mut strategy = build_strategy(StrategyKind::Composite, state(200, |_| true), 4, 5);
    run_to_end(strategy.as_mut(), 137).await;
    assert_eq!(strategy.frontier(), Some((136, 137)));
}

#[tokio::test]
async fn test_resume_from_snapshot() {
    let mut first = NArySearch::new(state(100, |_| true), 2);

    // Evaluate both boundaries, then dispatch one more value and "crash".
    for _ in 0..2 {
        let NextStep::Evaluate(value) = first.next().await.unwrap() else {
            panic!("expected a boundary");
        };
        first.update_outcome(&value, Some(value >= 61)).unwrap();
    }
    let NextStep::Evaluate(in_flight) = first.next().await.unwrap() else {
        panic!("expected a split point");
    };
    let snapshot = first.snapshot();
    assert_eq!(snapshot[in_flight as usize].state, ElementState::InProgress);

    let resumed_state =
        SequenceState::with_prior_elements((0..100).collect(), oracle(|_| true), snapshot).unwrap();
    assert_eq!(
        resumed_state.element(in_flight as usize).state(),
        ElementState::Initialized
    );
    assert_eq!(resumed_state.element(0).outcome(), Some(false));

    let mut resumed = NArySearch::new(resumed_state, 2);
    let evaluated = run_to_end(&mut resumed, 61).await;
    assert!(!evaluated.contains(&0) && !evaluated.contains(&99));
    assert_eq!(resumed.frontier(), Some((60, 61)));
}

#[tokio::test]
async fn test_prior_elements_must_match_values() {
    let snapshot = state(5, |_| true).snapshot();
    let result = SequenceState::with_prior_elements((1..6).collect(), oracle(|_| true), snapshot);
    assert!(matches!(result, Err(SearchError::InvalidPriorElements(_))));

    let short = state(4, |_| true).snapshot();
    let result = SequenceState::with_prior_elements((0..5).collect(), oracle(|_| true), short);
    assert!(matches!(result, Err(SearchError::InvalidPriorElements(_))));
}

#[tokio::test]
async fn test_second_outcome_is_rejected() {
    let mut strategy = build_strategy(StrategyKind::Search, state(10, |_| true), 2, 100);
    let NextStep::Evaluate(value) = strategy.next().await.unwrap() else {
        panic!("expected a value");
    };
    strategy.update_outcome(&value, Some(true)).unwrap();
    assert!(matches!(
        strategy.update_outcome(&value, Some(false)),
        Err(SearchError::AlreadyEvaluated { .. })
    ));
}
