//! Tests for the error join primitive.
//!
//! Validates first-error semantics, zero capacity, deadlines, and
//! behavior when workers report from many tasks at once.

use magikcompose::{Error, ErrorWaitGroup};
use std::time::{Duration, Instant};

fn failure(tag: &str) -> Error {
    Error::Internal(tag.to_string())
}

// =============================================================================
// Wait Tests
// =============================================================================

#[tokio::test]
async fn test_wait_all_ok() {
    let wg = ErrorWaitGroup::new(3);
    for _ in 0..3 {
        wg.handle().done(Ok(()));
    }
    assert!(wg.wait().await.is_ok());
}

#[tokio::test]
async fn test_wait_returns_first_error() {
    let wg = ErrorWaitGroup::new(4);
    wg.handle().done(Ok(()));
    wg.handle().done(Err(failure("first")));
    wg.handle().done(Err(failure("second")));
    wg.handle().done(Ok(()));

    let err = wg.wait().await.unwrap_err();
    assert!(err.to_string().contains("first"), "got {err}");
}

#[tokio::test]
async fn test_wait_zero_capacity_needs_no_reports() {
    let wg = ErrorWaitGroup::new(0);
    assert_eq!(wg.size(), 0);
    assert!(wg.wait().await.is_ok());
}

#[tokio::test]
async fn test_wait_collects_from_spawned_tasks() {
    let wg = ErrorWaitGroup::new(16);
    for i in 0..16u64 {
        let done = wg.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(i % 4)).await;
            if i == 9 {
                done.done(Err(failure("task 9")));
            } else {
                done.done(Ok(()));
            }
        });
    }

    let err = wg.wait().await.unwrap_err();
    assert!(err.to_string().contains("task 9"));
}

#[tokio::test]
async fn test_panicked_worker_is_reported() {
    let wg = ErrorWaitGroup::new(2);
    wg.handle().done(Ok(()));
    let done = wg.handle();
    let task = tokio::spawn(async move {
        let _done = done;
        panic!("worker blew up");
    });
    assert!(task.await.is_err());

    assert!(matches!(wg.wait().await, Err(Error::WorkerLost)));
}

// =============================================================================
// Deadline Tests
// =============================================================================

#[tokio::test]
async fn test_wait_for_times_out_when_outcomes_missing() {
    let wg = ErrorWaitGroup::new(2);
    wg.handle().done(Ok(()));
    // Second handle is kept alive and never reports.
    let _pending = wg.handle();

    let started = Instant::now();
    let err = wg.wait_for(Duration::from_millis(50)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2), "blocked for {elapsed:?}");
}

#[tokio::test]
async fn test_wait_for_returns_error_before_deadline() {
    let wg = ErrorWaitGroup::new(1);
    wg.handle().done(Err(failure("boom")));

    let err = wg.wait_for(Duration::from_secs(5)).await.unwrap_err();
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn test_wait_for_deadline_is_overall() {
    // Outcomes arrive 60ms apart, each gap under the 100ms deadline, but
    // the last one lands at 180ms.
    let wg = ErrorWaitGroup::new(3);
    for i in 1..=3u64 {
        let done = wg.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(i * 60)).await;
            done.done(Ok(()));
        });
    }

    let err = wg.wait_for(Duration::from_millis(100)).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_late_report_after_timeout_is_harmless() {
    let wg = ErrorWaitGroup::new(1);
    let done = wg.handle();
    assert!(wg.wait_for(Duration::from_millis(10)).await.is_err());
    // Receiver is gone; reporting must not panic.
    done.done(Ok(()));
}
