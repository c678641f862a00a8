//! Contract: replication waits are bounded and return as early as possible
//!
//! Constraints verified:
//! - the first successful poll ends the wait without sleeping
//! - no poll happens after the timeout has elapsed
//! - the total time slept never exceeds the timeout
//! - non-transient errors end the wait immediately

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use azuread_core::error::Error;
use azuread_core::replication::{ReplicationPolicy, ReplicationWaiter};
use common::*;

fn waiter(clock: Arc<ManualClock>, timeout: Duration) -> ReplicationWaiter {
    ReplicationWaiter::with_clock(
        ReplicationPolicy::new(timeout)
            .with_poll_interval(Duration::from_secs(1))
            .with_max_poll_interval(Duration::from_secs(4)),
        clock,
    )
}

#[tokio::test]
async fn first_success_returns_without_sleeping() {
    let clock = ManualClock::new();
    let waiter = waiter(clock.clone(), Duration::from_secs(30));

    let value = waiter
        .wait_for_creation("group", || async { Ok::<_, Error>("ready") })
        .await
        .unwrap();

    assert_eq!(value, "ready");
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn not_found_is_retried_until_visible() {
    let clock = ManualClock::new();
    let waiter = waiter(clock.clone(), Duration::from_secs(30));
    let polls = AtomicUsize::new(0);
    let counter = &polls;

    let value = waiter
        .wait_for_creation("group", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(Error::not_found("group"))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(polls.load(Ordering::SeqCst), 4);
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test]
async fn wait_never_outlives_its_timeout() {
    let clock = ManualClock::new();
    let timeout = Duration::from_secs(10);
    let waiter = waiter(clock.clone(), timeout);
    let polls = AtomicUsize::new(0);
    let counter = &polls;

    let result = waiter
        .wait_for_creation("application", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::not_found("application"))
        })
        .await;

    assert!(matches!(result, Err(Error::ReplicationTimeout { .. })));
    assert_eq!(clock.elapsed(), timeout);
    let slept: Duration = clock.sleeps().iter().sum();
    assert!(slept <= timeout);
    // 1 + 2 + 4 + 3 (clamped): one poll before each sleep and one at the deadline
    assert_eq!(polls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn permanent_errors_stop_the_wait() {
    let clock = ManualClock::new();
    let waiter = waiter(clock.clone(), Duration::from_secs(30));

    let result = waiter
        .wait_for_creation("group", || async {
            Err::<(), _>(Error::api(400, "Request_BadRequest", "bad"))
        })
        .await;

    assert!(matches!(result, Err(Error::Api { status: 400, .. })));
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn list_remove_waits_until_value_disappears() {
    let clock = ManualClock::new();
    let waiter = waiter(clock.clone(), Duration::from_secs(30));
    let polls = AtomicUsize::new(0);
    let counter = &polls;

    let remaining = waiter
        .wait_for_list_remove("group members", USER_A, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![USER_A.to_uppercase(), USER_B.to_string()])
            } else {
                Ok(vec![USER_B.to_string()])
            }
        })
        .await
        .unwrap();

    assert_eq!(remaining, vec![USER_B]);
    assert_eq!(clock.sleeps().len(), 1);
}

#[tokio::test]
async fn timeout_reports_last_observation() {
    let clock = ManualClock::new();
    let waiter = waiter(clock, Duration::from_secs(2));

    let err = waiter
        .wait_for_list_remove("group members", USER_A, || async {
            Ok(vec![USER_A.to_string()])
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains(USER_A));
}
