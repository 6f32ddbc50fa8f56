//! Concurrency ceiling of the worker dispatcher.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use bci::adapters::InMemoryResultStore;
use bci::domain::errors::DispatchError;
use bci::domain::models::RevisionId;
use bci::services::WorkerDispatcher;
use common::{eval_params, fast_settings, ground_truth, FakeRuntime};

#[tokio::test]
async fn test_two_slots_five_items_never_exceed_two() {
    let runtime = Arc::new(
        FakeRuntime::new(InMemoryResultStore::new(), ground_truth(3))
            .with_work(Duration::from_millis(30)),
    );
    let dispatcher = WorkerDispatcher::new(runtime.clone(), 2, fast_settings());
    let params = eval_params();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for position in 0..5u64 {
        let tx = tx.clone();
        dispatcher
            .start_worker(
                params.worker_params(&RevisionId::Position(position)),
                move |result| async move {
                    let _ = tx.send(result.is_ok());
                },
            )
            .await
            .unwrap();
        assert!(runtime.active() <= 2);
    }
    drop(tx);

    let mut completed = 0;
    while let Some(ok) = rx.recv().await {
        assert!(ok);
        completed += 1;
    }
    dispatcher.wait_until_idle().await.unwrap();

    assert_eq!(completed, 5);
    assert!(runtime.peak() <= 2, "peak was {}", runtime.peak());
    assert_eq!(runtime.launched().len(), 5);
    assert_eq!(dispatcher.free_slots(), 2);
    assert_eq!(dispatcher.running(), 0);
}

#[tokio::test]
async fn test_flood_stays_bounded() {
    let runtime = Arc::new(
        FakeRuntime::new(InMemoryResultStore::new(), ground_truth(50))
            .with_work(Duration::from_millis(5)),
    );
    let dispatcher = Arc::new(WorkerDispatcher::new(runtime.clone(), 3, fast_settings()));
    let params = eval_params();

    // Several submitters race for the same dispatcher.
    let mut submitters = Vec::new();
    for offset in 0..4u64 {
        let dispatcher = dispatcher.clone();
        let params = params.clone();
        submitters.push(tokio::spawn(async move {
            for i in 0..10u64 {
                let position = offset * 10 + i;
                dispatcher
                    .start_worker(
                        params.worker_params(&RevisionId::Position(position)),
                        |_| async {},
                    )
                    .await
                    .unwrap();
            }
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap();
    }
    dispatcher.wait_until_idle().await.unwrap();

    assert!(runtime.peak() <= 3, "peak was {}", runtime.peak());
    assert_eq!(runtime.launched().len(), 40);
    assert_eq!(dispatcher.free_slots(), 3);
}

#[tokio::test]
async fn test_failing_launches_leak_no_slots() {
    let runtime = Arc::new(
        FakeRuntime::new(InMemoryResultStore::new(), ground_truth(0)).failing(0..6),
    );
    let dispatcher = WorkerDispatcher::new(runtime.clone(), 2, fast_settings());
    let params = eval_params();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for position in 0..6u64 {
        let tx = tx.clone();
        dispatcher
            .start_worker(
                params.worker_params(&RevisionId::Position(position)),
                move |result| async move {
                    let _ = tx.send(result);
                },
            )
            .await
            .unwrap();
    }
    drop(tx);

    let mut failures = 0;
    while let Some(result) = rx.recv().await {
        assert!(matches!(result, Err(DispatchError::Runtime(_))));
        failures += 1;
    }
    dispatcher.wait_until_idle().await.unwrap();

    assert_eq!(failures, 6);
    assert!(runtime.launched().is_empty());
    assert_eq!(dispatcher.free_slots(), 2);
    assert_eq!(dispatcher.running(), 0);
}
