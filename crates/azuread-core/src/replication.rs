// # Replication Waits
//
// Directory writes are not immediately visible to reads. After a create,
// or after removing an element from a relationship, handlers poll until the
// change is observable.
//
// ## Guarantees
//
// - returns on the first poll that satisfies the predicate
// - never polls after the timeout has elapsed
// - sleeps `min(interval, remaining)` between polls, growing the interval
//   geometrically up to `max_poll_interval`
// - transient failures (not found, throttling, 5xx) are retried; anything
//   else is returned immediately
//
// Time is read through [`Clock`] so tests can run without real sleeps.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Time source for poll loops
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounds for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationPolicy {
    /// Upper bound on the whole wait
    pub timeout: Duration,
    /// Delay before the second poll
    pub poll_interval: Duration,
    /// Cap for the growing delay
    pub max_poll_interval: Duration,
    /// Interval multiplier applied after each failed poll
    pub backoff_factor: u32,
}

impl ReplicationPolicy {
    /// Policy with the given timeout and the default 1s..10s doubling interval
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(10),
            backoff_factor: 2,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    pub fn with_backoff_factor(mut self, factor: u32) -> Self {
        self.backoff_factor = factor.max(1);
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.backoff_factor)
            .min(self.max_poll_interval)
    }
}

/// Runs bounded poll loops under a [`ReplicationPolicy`]
#[derive(Clone)]
pub struct ReplicationWaiter {
    policy: ReplicationPolicy,
    clock: Arc<dyn Clock>,
}

impl ReplicationWaiter {
    /// Waiter using the tokio clock
    pub fn new(policy: ReplicationPolicy) -> Self {
        Self::with_clock(policy, Arc::new(TokioClock))
    }

    pub fn with_clock(policy: ReplicationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &ReplicationPolicy {
        &self.policy
    }

    /// Poll until a read of `object` succeeds and return what it read.
    pub async fn wait_for_creation<T, F, Fut>(&self, object: &str, poll: F) -> Result<T>
    where
        T: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.poll_until(object, poll, |_| true).await
    }

    /// Poll a list read until `value` is no longer in it (case-insensitive).
    pub async fn wait_for_list_remove<F, Fut>(
        &self,
        object: &str,
        value: &str,
        poll: F,
    ) -> Result<Vec<String>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        self.poll_until(object, poll, |items: &Vec<String>| {
            !items.iter().any(|item| item.eq_ignore_ascii_case(value))
        })
        .await
    }

    /// Poll until `done` holds for a successful read.
    pub async fn poll_until<T, F, Fut, P>(&self, object: &str, mut poll: F, mut done: P) -> Result<T>
    where
        T: Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: FnMut(&T) -> bool,
    {
        let timeout = self.policy.timeout;
        let start = self.clock.now();
        let mut interval = self.policy.poll_interval;
        let mut last_observed = String::from("nothing");
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match poll().await {
                Ok(value) if done(&value) => {
                    if attempt > 1 {
                        debug!(object, attempt, "replication observed");
                    }
                    return Ok(value);
                }
                Ok(value) => {
                    last_observed = format!("{value:?}");
                }
                Err(err) if err.is_transient() => {
                    warn!(object, attempt, error = %err, "waiting for replication");
                    last_observed = err.to_string();
                }
                Err(err) => return Err(err),
            }

            let elapsed = self.clock.now().saturating_duration_since(start);
            if elapsed >= timeout {
                return Err(Error::replication_timeout(object, timeout, last_observed));
            }

            self.clock.sleep(interval.min(timeout - elapsed)).await;
            interval = self.policy.next_interval(interval);
        }
    }
}
