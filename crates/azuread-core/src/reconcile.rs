//! Desired vs. existing set reconciliation for relationships.
//!
//! Identifiers are compared case-insensitively. Output keeps the casing of
//! the set an element came from, in first-seen order, with duplicates
//! collapsed.

use std::collections::HashSet;

use tracing::debug;

use crate::Result;
use crate::traits::RelationshipApi;

/// The writes needed to turn an existing set into a desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDelta {
    /// In `desired` but not in `existing`
    pub to_add: Vec<String>,
    /// In `existing` but not in `desired`
    pub to_remove: Vec<String>,
}

impl SetDelta {
    /// Pure set difference in both directions
    pub fn compute<E, D>(existing: &[E], desired: &[D]) -> Self
    where
        E: AsRef<str>,
        D: AsRef<str>,
    {
        let existing_keys: HashSet<String> = existing.iter().map(|v| key(v.as_ref())).collect();
        let desired_keys: HashSet<String> = desired.iter().map(|v| key(v.as_ref())).collect();

        Self {
            to_add: difference(desired, &existing_keys),
            to_remove: difference(existing, &desired_keys),
        }
    }

    /// Nothing to write
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

fn key(id: &str) -> String {
    id.to_lowercase()
}

fn difference<T: AsRef<str>>(source: &[T], exclude: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    source
        .iter()
        .map(AsRef::as_ref)
        .filter(|id| {
            let k = key(id);
            !exclude.contains(&k) && seen.insert(k)
        })
        .map(str::to_string)
        .collect()
}

/// Bring the relationship of `object_id` to exactly `desired`.
///
/// Lists the existing set, then issues one add call with every missing
/// element followed by one remove call with every surplus element. Empty
/// calls are skipped. A failed add returns before any removal is attempted,
/// so re-running after a failure is safe.
pub async fn reconcile<A, D>(api: &A, object_id: &str, desired: &[D]) -> Result<SetDelta>
where
    A: RelationshipApi + ?Sized,
    D: AsRef<str> + Sync,
{
    let existing = api.list(object_id).await?;
    let delta = SetDelta::compute(&existing, desired);
    apply(api, object_id, &delta).await?;
    Ok(delta)
}

/// Apply a precomputed delta: additions first, then removals
pub async fn apply<A>(api: &A, object_id: &str, delta: &SetDelta) -> Result<()>
where
    A: RelationshipApi + ?Sized,
{
    if !delta.to_add.is_empty() {
        debug!(
            object_id,
            relationship = api.relationship(),
            count = delta.to_add.len(),
            "adding to relationship"
        );
        api.add(object_id, &delta.to_add).await?;
    }

    if !delta.to_remove.is_empty() {
        debug!(
            object_id,
            relationship = api.relationship(),
            count = delta.to_remove.len(),
            "removing from relationship"
        );
        api.remove(object_id, &delta.to_remove).await?;
    }

    Ok(())
}
