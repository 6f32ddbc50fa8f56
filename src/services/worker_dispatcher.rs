//! Bounded dispatcher of isolated evaluation workers.
//!
//! A fixed pool of slot ids caps how many workers this process launches at
//! once. Each launch runs on its own tokio task which removes a stale worker
//! left under the slot's name, runs the new one to completion and hands the
//! result to a completion callback. Slots return to the pool on every path.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::domain::errors::{DispatchError, DispatchResult};
use crate::domain::models::{DispatcherConfig, WorkerParams};
use crate::domain::ports::WorkerRuntime;

/// Timing and naming of dispatched workers.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Interval of the capacity and idle polls.
    pub poll_interval: Duration,
    /// Pause after each launch so the new worker shows in the running count.
    pub launch_grace: Duration,
    /// Workers are named `<prefix>_<slot>`.
    pub name_prefix: String,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            launch_grace: Duration::from_millis(5000),
            name_prefix: "bci_worker".to_string(),
        }
    }
}

impl From<&DispatcherConfig> for DispatcherSettings {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            launch_grace: Duration::from_millis(config.launch_grace_ms),
            name_prefix: config.label.clone(),
        }
    }
}

/// Semaphore of slot tokens plus the free slot ids.
#[derive(Clone)]
struct SlotPool {
    permits: Arc<Semaphore>,
    free: Arc<Mutex<Vec<usize>>>,
}

/// A held slot. Dropping it returns the id before releasing the permit.
struct SlotLease {
    id: usize,
    free: Arc<Mutex<Vec<usize>>>,
    _permit: OwnedSemaphorePermit,
}

impl SlotPool {
    fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            // Reversed so that slot 0 is handed out first.
            free: Arc::new(Mutex::new((0..capacity).rev().collect())),
        }
    }

    async fn acquire(&self) -> DispatchResult<SlotLease> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::PoolClosed)?;
        let id = self
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .ok_or(DispatchError::PoolClosed)?;
        Ok(SlotLease {
            id,
            free: self.free.clone(),
            _permit: permit,
        })
    }

    fn free_slots(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(self.id);
    }
}

/// Decrements the in-flight counter when a worker task ends.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct WorkerDispatcher {
    runtime: Arc<dyn WorkerRuntime>,
    capacity: usize,
    slots: SlotPool,
    in_flight: Arc<AtomicUsize>,
    settings: DispatcherSettings,
}

impl WorkerDispatcher {
    pub fn new(runtime: Arc<dyn WorkerRuntime>, capacity: usize, settings: DispatcherSettings) -> Self {
        let capacity = capacity.max(1);
        Self {
            runtime,
            capacity,
            slots: SlotPool::new(capacity),
            in_flight: Arc::new(AtomicUsize::new(0)),
            settings,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of workers dispatched by this process that have not finished.
    pub fn running(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Slot ids currently not leased.
    pub fn free_slots(&self) -> usize {
        self.slots.free_slots()
    }

    /// Launch one worker for `params` and call `on_complete` with the result
    /// of the launch once the worker has exited.
    ///
    /// Returns after the worker task is spawned and the launch grace period
    /// has passed, not when the worker finishes.
    ///
    /// # Errors
    ///
    /// Fails without calling `on_complete` if the running workers cannot be
    /// counted or the slot pool is closed.
    pub async fn start_worker<F, Fut>(&self, params: WorkerParams, on_complete: F) -> DispatchResult<()>
    where
        F: FnOnce(DispatchResult<()>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.wait_for_capacity().await?;
        let lease = self.slots.acquire().await?;
        let in_flight = InFlight::enter(&self.in_flight);

        let name = format!("{}_{}", self.settings.name_prefix, lease.id);
        let revision = params.revision.to_string();
        let args = params.to_args();
        let runtime = self.runtime.clone();
        info!(revision = %revision, slot = lease.id, container = %name, "starting worker");

        tokio::spawn(async move {
            let _lease = lease;
            let _in_flight = in_flight;
            // A panicking worker still reports back through `on_complete`.
            let worker_name = name.clone();
            let worker =
                tokio::spawn(async move { launch(runtime.as_ref(), &worker_name, &args).await });
            let result = match worker.await {
                Ok(result) => result,
                Err(e) => Err(DispatchError::Runtime(format!("worker task {name} aborted: {e}"))),
            };
            match &result {
                Ok(()) => debug!(revision = %revision, container = %name, "worker exited"),
                Err(e) => warn!(revision = %revision, container = %name, error = %e, "worker failed"),
            }
            on_complete(result).await;
        });

        if !self.settings.launch_grace.is_zero() {
            tokio::time::sleep(self.settings.launch_grace).await;
        }
        Ok(())
    }

    async fn wait_for_capacity(&self) -> DispatchResult<()> {
        loop {
            let running = self.runtime.running_count().await?;
            if running < self.capacity {
                return Ok(());
            }
            debug!(running, capacity = self.capacity, "waiting for a free worker");
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Wait until no dispatched task and no running worker remain.
    pub async fn wait_until_idle(&self) -> DispatchResult<()> {
        loop {
            let in_flight = self.running();
            let running = self.runtime.running_count().await?;
            if in_flight == 0 && running == 0 {
                return Ok(());
            }
            debug!(in_flight, running, "waiting for workers to finish");
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

async fn launch(runtime: &dyn WorkerRuntime, name: &str, args: &[String]) -> DispatchResult<()> {
    let removed = runtime.remove_stale(name).await?;
    if removed > 0 {
        debug!(container = %name, removed, "removed stale worker");
    }
    runtime.run(name, args).await
}
