//! Common test utilities for integration tests
//!
//! A fake worker runtime that evaluates a monotonic ground truth and writes
//! its outcome into an in-memory result store, plus lineage and parameter
//! fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bci::adapters::InMemoryResultStore;
use bci::domain::errors::{DispatchError, DispatchResult};
use bci::domain::models::{EvalParams, Lineage, RevisionId};
use bci::domain::ports::WorkerRuntime;
use bci::services::DispatcherSettings;

/// Parameters every test run shares.
pub fn eval_params() -> EvalParams {
    EvalParams {
        framework_name: "custom".to_string(),
        automation: "selenium".to_string(),
        browser: "chromium".to_string(),
        configuration: Default::default(),
        mech_id: None,
        mech_groups: vec!["Set-Cookie".to_string()],
        extension_name: None,
        additional_cli_args: vec![],
        cookie_name: None,
    }
}

/// Lineage of consecutive commit positions.
pub fn position_lineage(range: std::ops::Range<u64>) -> Lineage {
    Lineage::from_ids(range.map(RevisionId::Position).collect(), None)
        .expect("valid lineage")
}

/// Dispatcher settings without real-time pauses.
pub fn fast_settings() -> DispatcherSettings {
    DispatcherSettings {
        poll_interval: Duration::from_millis(2),
        launch_grace: Duration::ZERO,
        name_prefix: "test_worker".to_string(),
    }
}

/// Outcome of the fake experiment: the behavior appears at `boundary`.
pub fn ground_truth(boundary: u64) -> impl Fn(u64) -> bool + Send + Sync + 'static {
    move |position| position >= boundary
}

/// In-process stand-in for the container runtime.
pub struct FakeRuntime {
    params: EvalParams,
    store: InMemoryResultStore,
    outcome: Box<dyn Fn(u64) -> bool + Send + Sync>,
    work: Duration,
    failing: HashSet<u64>,
    silent: HashSet<u64>,
    panicking: HashSet<u64>,
    count_breaks_after_launch: bool,
    active: AtomicUsize,
    peak: AtomicUsize,
    launched: Mutex<Vec<u64>>,
}

impl FakeRuntime {
    pub fn new(store: InMemoryResultStore, outcome: impl Fn(u64) -> bool + Send + Sync + 'static) -> Self {
        Self {
            params: eval_params(),
            store,
            outcome: Box::new(outcome),
            work: Duration::from_millis(10),
            failing: HashSet::new(),
            silent: HashSet::new(),
            panicking: HashSet::new(),
            count_breaks_after_launch: false,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    /// Launches for these positions fail before a worker starts.
    pub fn failing(mut self, positions: impl IntoIterator<Item = u64>) -> Self {
        self.failing.extend(positions);
        self
    }

    /// Workers for these positions exit without recording a result.
    pub fn silent(mut self, positions: impl IntoIterator<Item = u64>) -> Self {
        self.silent.extend(positions);
        self
    }

    /// Workers for these positions panic instead of running.
    pub fn panicking(mut self, positions: impl IntoIterator<Item = u64>) -> Self {
        self.panicking.extend(positions);
        self
    }

    /// Counting running workers fails once any worker was launched.
    pub fn count_breaks_after_launch(mut self) -> Self {
        self.count_breaks_after_launch = true;
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Positions in launch order.
    pub fn launched(&self) -> Vec<u64> {
        self.launched.lock().unwrap().clone()
    }
}

fn state_id(args: &[String]) -> Option<u64> {
    args.iter()
        .position(|arg| arg == "--state_id")
        .and_then(|i| args.get(i + 1))
        .and_then(|id| id.parse().ok())
}

#[async_trait]
impl WorkerRuntime for FakeRuntime {
    async fn running_count(&self) -> DispatchResult<usize> {
        if self.count_breaks_after_launch && !self.launched().is_empty() {
            return Err(DispatchError::Runtime("docker ps failed".to_string()));
        }
        Ok(self.active())
    }

    async fn remove_stale(&self, _name: &str) -> DispatchResult<usize> {
        Ok(0)
    }

    async fn run(&self, name: &str, args: &[String]) -> DispatchResult<()> {
        let position = state_id(args)
            .ok_or_else(|| DispatchError::Runtime(format!("{name}: missing --state_id")))?;
        if self.failing.contains(&position) {
            return Err(DispatchError::Runtime(format!("{name}: image not found")));
        }
        if self.panicking.contains(&position) {
            panic!("{name}: worker crashed");
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.launched.lock().unwrap().push(position);

        tokio::time::sleep(self.work).await;
        if !self.silent.contains(&position) {
            let query = self.params.result_query(&RevisionId::Position(position));
            self.store.insert(query, Some((self.outcome)(position))).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn shared(runtime: FakeRuntime) -> Arc<FakeRuntime> {
    Arc::new(runtime)
}
