//! Tests for the partition coordinator

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_results_multiplex_onto_one_channel() {
    let (coordinator, mut rx) = PartitionCoordinator::<usize>::new(CoordinatorConfig::with_cap(4));

    for i in 0..5 {
        let tx = coordinator.sender();
        coordinator
            .submit(async move {
                tx.send(i).await.ok();
                Ok(())
            })
            .await;
    }

    coordinator.check_for_errors_and_shutdown().await.unwrap();

    let mut received = Vec::new();
    while let Some(v) = rx.recv().await {
        received.push(v);
    }
    received.sort_unstable();
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_concurrency_cap_is_never_exceeded() {
    let cap = 3;
    let (coordinator, _rx) = PartitionCoordinator::<()>::new(CoordinatorConfig::with_cap(cap));

    let current = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    for _ in 0..20 {
        let current = Arc::clone(&current);
        let max_seen = Arc::clone(&max_seen);
        coordinator
            .submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
    }

    coordinator.check_for_errors_and_shutdown().await.unwrap();
    assert!(max_seen.load(Ordering::SeqCst) <= cap);
}

#[tokio::test]
async fn test_first_error_is_raised_exactly_once() {
    let (coordinator, _rx) = PartitionCoordinator::<()>::new(CoordinatorConfig::with_cap(4));

    for i in 0..4 {
        coordinator
            .submit(async move {
                if i == 2 {
                    Err(crate::error::Error::transport("partition 2 exploded"))
                } else {
                    Ok(())
                }
            })
            .await;
    }

    let err = coordinator.check_for_errors_and_shutdown().await.unwrap_err();
    assert!(err.to_string().contains("partition 2 exploded"));
}

#[tokio::test]
async fn test_submissions_after_failure_are_dropped() {
    let (coordinator, _rx) = PartitionCoordinator::<()>::new(CoordinatorConfig::with_cap(1));

    coordinator
        .submit(async { Err(crate::error::Error::transport("boom")) })
        .await;

    // Give the failing task time to record its error.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coordinator.is_aborted());

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);
    coordinator
        .submit(async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

    let err = coordinator.check_for_errors_and_shutdown().await.unwrap_err();
    assert!(err.to_string().contains("boom"));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_in_flight_work_drains_before_error_surfaces() {
    let (coordinator, mut rx) = PartitionCoordinator::<&str>::new(CoordinatorConfig::with_cap(2));

    let tx = coordinator.sender();
    coordinator
        .submit(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send("slow-but-fine").await.ok();
            Ok(())
        })
        .await;
    coordinator
        .submit(async { Err(crate::error::Error::transport("fast failure")) })
        .await;

    let err = coordinator.check_for_errors_and_shutdown().await.unwrap_err();
    assert!(err.to_string().contains("fast failure"));

    // Results already emitted downstream are not retracted.
    let mut received = Vec::new();
    while let Some(v) = rx.recv().await {
        received.push(v);
    }
    assert!(received.len() <= 1);
}

#[tokio::test]
async fn test_clean_shutdown_with_no_work() {
    let (coordinator, mut rx) = PartitionCoordinator::<()>::new(CoordinatorConfig::default());
    coordinator.check_for_errors_and_shutdown().await.unwrap();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_worker_panic_becomes_coordinator_error() {
    let (coordinator, _rx) = PartitionCoordinator::<()>::new(CoordinatorConfig::with_cap(2));

    coordinator
        .submit(async {
            panic!("worker bug");
        })
        .await;

    let err = coordinator.check_for_errors_and_shutdown().await.unwrap_err();
    assert!(err.to_string().contains("panicked"));
}

#[tokio::test]
async fn test_output_channel_closes_on_shutdown() {
    let (coordinator, mut rx) = PartitionCoordinator::<u32>::new(CoordinatorConfig::with_cap(2));

    let tx = coordinator.sender();
    coordinator
        .submit(async move {
            tx.send(7).await.ok();
            Ok(())
        })
        .await;

    coordinator.check_for_errors_and_shutdown().await.unwrap();
    assert_eq!(rx.recv().await, Some(7));
    assert!(rx.recv().await.is_none());
}
