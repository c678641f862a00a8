//! Named mutexes shared by the provider.
//!
//! Credential and membership resources that belong to the same parent
//! rewrite one list on the backend, so they take the lock for
//! `"{resource_type}.{name}"` around their read-modify-write. Entries are
//! created on first use and kept for the lifetime of the registry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of lazily created named locks
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock on `(resource_type, name)`.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(&self, resource_type: &str, name: &str) -> NamedLockGuard {
        let key = format!("{resource_type}.{name}");
        let mutex = self.locks.entry(key.clone()).or_default().clone();

        trace!(lock = %key, "acquiring lock");
        let guard = mutex.lock_owned().await;
        trace!(lock = %key, "acquired lock");

        NamedLockGuard { key, _guard: guard }
    }

    /// Number of distinct names ever locked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds a named lock until dropped
#[derive(Debug)]
pub struct NamedLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release explicitly; equivalent to dropping the guard
    pub fn release(self) {}
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        trace!(lock = %self.key, "released lock");
    }
}
