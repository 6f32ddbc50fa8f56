//! Search orchestration loop.
//!
//! Pulls revisions from a strategy, serves them from the result store when a
//! full result is already recorded and dispatches a worker otherwise. Worker
//! completions come back over a channel, so the loop is the only writer of
//! strategy and lineage state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::SearchResult;
use crate::domain::models::{
    ElementState, EvalParams, EvaluationResult, Lineage, ResultQuery, Revision,
};
use crate::domain::ports::{AvailabilityOracle, ResultStore};
use crate::services::search_strategy::{
    build_strategy, NextStep, SearchStrategy, SequenceState, StrategyKind,
};
use crate::services::worker_dispatcher::WorkerDispatcher;

/// Cooperative stop flag, checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Strategy selection of one run.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub strategy: StrategyKind,
    pub branching_factor: usize,
    pub sequence_limit: usize,
}

impl SearchOptions {
    /// Options with the branching factor following the worker concurrency.
    pub fn new(strategy: StrategyKind, concurrency: usize, sequence_limit: usize) -> Self {
        Self {
            strategy,
            branching_factor: concurrency.max(2),
            sequence_limit,
        }
    }

    pub fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor.max(2);
        self
    }
}

/// Progress notifications for interactive output.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    Cached { revision: Revision, result: EvaluationResult },
    Dispatched { revision: Revision },
    Completed { revision: Revision, result: EvaluationResult },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    StopRequested,
}

/// Summary of one search run.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub run_id: Uuid,
    pub strategy: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Last revision before and first revision after the transition.
    pub frontier: Option<(Revision, Revision)>,
    pub cached: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub stop_reason: StopReason,
}

/// Outcome of one evaluation, sent by worker callbacks to the loop.
#[derive(Debug)]
struct Completion {
    revision: Revision,
    result: std::result::Result<Option<bool>, String>,
}

#[derive(Debug, Default)]
struct Tally {
    cached: usize,
    dispatched: usize,
    failed: usize,
}

pub struct SearchOrchestrator {
    params: EvalParams,
    store: Arc<dyn ResultStore>,
    dispatcher: WorkerDispatcher,
    stop: StopHandle,
    events: Option<mpsc::UnboundedSender<SearchEvent>>,
}

impl SearchOrchestrator {
    pub fn new(params: EvalParams, store: Arc<dyn ResultStore>, dispatcher: WorkerDispatcher) -> Self {
        Self {
            params,
            store,
            dispatcher,
            stop: StopHandle::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SearchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn dispatcher(&self) -> &WorkerDispatcher {
        &self.dispatcher
    }

    /// Build the selected strategy over `lineage` and run it.
    pub async fn run_search(
        &self,
        lineage: &mut Lineage,
        oracle: Arc<dyn AvailabilityOracle<Revision>>,
        options: &SearchOptions,
    ) -> Result<SearchReport> {
        let state = SequenceState::new(lineage.revisions().to_vec(), oracle)
            .context("Failed to prepare search state")?;
        let mut strategy = build_strategy(
            options.strategy,
            state,
            options.branching_factor,
            options.sequence_limit,
        );
        self.run(lineage, strategy.as_mut()).await
    }

    /// Drive `strategy` to exhaustion or until a stop is requested.
    ///
    /// Workers still running when the loop ends are awaited and their
    /// outcomes applied before returning. A contract violation by the
    /// strategy aborts the run after that drain.
    pub async fn run(
        &self,
        lineage: &mut Lineage,
        strategy: &mut dyn SearchStrategy<Revision>,
    ) -> Result<SearchReport> {
        self.params.validate()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("search", %run_id, strategy = strategy.name());

        async move {
            info!(revisions = lineage.len(), "search started");
            let (tx, mut rx) = mpsc::unbounded_channel();
            let mut tally = Tally::default();

            let driven = self
                .drive(lineage, strategy, &tx, &mut rx, &mut tally)
                .await;

            let idle = self.dispatcher.wait_until_idle().await;
            if let Err(e) = &idle {
                warn!(error = %e, "could not confirm that all workers finished");
            }
            // Every dispatched task holds a sender until its callback ran.
            drop(tx);
            while let Some(completion) = rx.recv().await {
                if let Err(e) = self.apply(completion, lineage, strategy, &mut tally) {
                    warn!(error = %e, "could not apply late outcome");
                }
            }
            idle.context("Failed waiting for workers to finish")?;
            let stop_reason = driven?;

            for element in strategy.state().elements() {
                if element.state() == ElementState::Unavailable {
                    lineage.record_result(&element.value().id, EvaluationResult::BuildUnavailable)?;
                }
            }

            let state = strategy.state();
            let frontier = strategy.frontier().map(|(low, high)| {
                (
                    state.element(low).value().clone(),
                    state.element(high).value().clone(),
                )
            });
            let report = SearchReport {
                run_id,
                strategy: strategy.name().to_string(),
                started_at,
                finished_at: Utc::now(),
                frontier,
                cached: tally.cached,
                dispatched: tally.dispatched,
                failed: tally.failed,
                stop_reason,
            };
            info!(
                cached = report.cached,
                dispatched = report.dispatched,
                failed = report.failed,
                stop_reason = ?report.stop_reason,
                "search finished"
            );
            Ok::<_, anyhow::Error>(report)
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        lineage: &mut Lineage,
        strategy: &mut dyn SearchStrategy<Revision>,
        tx: &mpsc::UnboundedSender<Completion>,
        rx: &mut mpsc::UnboundedReceiver<Completion>,
        tally: &mut Tally,
    ) -> Result<StopReason> {
        loop {
            while let Ok(completion) = rx.try_recv() {
                self.apply(completion, lineage, strategy, tally)?;
            }
            if self.stop.is_stop_requested() {
                info!("stop requested, no further evaluations are scheduled");
                return Ok(StopReason::StopRequested);
            }

            match strategy.next().await? {
                NextStep::Evaluate(revision) => {
                    self.evaluate(revision, lineage, strategy, tx, tally).await?;
                }
                NextStep::AwaitOutcomes => {
                    if let Some(completion) = rx.recv().await {
                        self.apply(completion, lineage, strategy, tally)?;
                    }
                }
                NextStep::Exhausted => return Ok(StopReason::Exhausted),
            }
        }
    }

    async fn evaluate(
        &self,
        revision: Revision,
        lineage: &mut Lineage,
        strategy: &mut dyn SearchStrategy<Revision>,
        tx: &mpsc::UnboundedSender<Completion>,
        tally: &mut Tally,
    ) -> Result<()> {
        let query = self.params.result_query(&revision.id);

        if let Some(outcome) = self.cached_outcome(&query).await {
            tally.cached += 1;
            info!(revision = %revision, ?outcome, "served from result store");
            self.emit(SearchEvent::Cached {
                revision: revision.clone(),
                result: outcome.map_or_else(
                    || EvaluationResult::Error("no outcome recorded".to_string()),
                    EvaluationResult::from_outcome,
                ),
            });
            let completion = Completion {
                revision,
                result: Ok(outcome),
            };
            self.apply(completion, lineage, strategy, tally)?;
            return Ok(());
        }

        tally.dispatched += 1;
        info!(revision = %revision, "dispatching worker");
        self.emit(SearchEvent::Dispatched {
            revision: revision.clone(),
        });

        let store = self.store.clone();
        let tx = tx.clone();
        let dispatched = revision.clone();
        let launched = self
            .dispatcher
            .start_worker(
                self.params.worker_params(&revision.id),
                move |launch| async move {
                    let result = match launch {
                        Ok(()) => store
                            .get_result(&query)
                            .await
                            .map_err(|e| format!("{e:#}")),
                        Err(e) => Err(e.to_string()),
                    };
                    let _ = tx.send(Completion {
                        revision: dispatched,
                        result,
                    });
                },
            )
            .await;

        if let Err(e) = launched {
            warn!(revision = %revision, error = %e, "could not start worker");
            let completion = Completion {
                revision,
                result: Err(e.to_string()),
            };
            self.apply(completion, lineage, strategy, tally)?;
        }
        Ok(())
    }

    /// Stored outcome for `query` if every requested group has a result.
    /// Store failures are logged and treated as a miss.
    async fn cached_outcome(&self, query: &ResultQuery) -> Option<Option<bool>> {
        match self.store.has_result(query).await {
            Ok(true) => match self.store.get_result(query).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(revision = %query.revision, error = %e, "result lookup failed");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!(revision = %query.revision, error = %e, "result lookup failed");
                None
            }
        }
    }

    fn apply(
        &self,
        completion: Completion,
        lineage: &mut Lineage,
        strategy: &mut dyn SearchStrategy<Revision>,
        tally: &mut Tally,
    ) -> SearchResult<()> {
        let Completion { revision, result } = completion;
        let outcome = result.as_ref().ok().copied().flatten();
        strategy.update_outcome(&revision, outcome)?;

        let slot = match result {
            Ok(Some(outcome)) => EvaluationResult::from_outcome(outcome),
            Ok(None) => EvaluationResult::Error("no outcome recorded".to_string()),
            Err(message) => EvaluationResult::Error(message),
        };
        if outcome.is_none() {
            tally.failed += 1;
        }
        info!(revision = %revision, result = %slot, "outcome recorded");
        lineage.record_result(&revision.id, slot.clone())?;
        self.emit(SearchEvent::Completed {
            revision,
            result: slot,
        });
        Ok(())
    }

    fn emit(&self, event: SearchEvent) {
        if let Some(ref events) = self.events {
            let _ = events.send(event);
        }
    }
}
