//! Contract: set-valued relationships converge with the fewest calls
//!
//! Constraints verified:
//! - an empty delta issues no add or remove call
//! - additions are sent before removals
//! - a failed add stops before anything is removed
//! - IDs compare case-insensitively

mod common;

use azuread_core::reconcile::{SetDelta, reconcile};
use common::*;

#[tokio::test]
async fn adding_to_an_empty_set_issues_one_add_only() {
    let api = RecordingRelationship::new(&[]);

    let delta = reconcile(&api, GROUP_ID, &[USER_A, USER_B]).await.unwrap();

    assert_eq!(delta.to_add, vec![USER_A, USER_B]);
    assert!(delta.to_remove.is_empty());
    assert_eq!(
        api.calls(),
        vec![Call::List, Call::Add(vec![USER_A.into(), USER_B.into()])]
    );
}

#[tokio::test]
async fn swap_adds_before_it_removes() {
    let api = RecordingRelationship::new(&[USER_A, USER_B]);

    reconcile(&api, GROUP_ID, &[USER_B, USER_C]).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![
            Call::List,
            Call::Add(vec![USER_C.into()]),
            Call::Remove(vec![USER_A.into()]),
        ]
    );
    let mut members = api.members();
    members.sort();
    assert_eq!(members, vec![USER_B, USER_C]);
}

#[tokio::test]
async fn converged_set_issues_no_writes() {
    let upper = USER_A.to_uppercase();
    let api = RecordingRelationship::new(&[upper.as_str()]);

    let delta = reconcile(&api, GROUP_ID, &[USER_A]).await.unwrap();

    assert!(delta.is_empty());
    assert_eq!(api.calls(), vec![Call::List]);
}

#[tokio::test]
async fn failed_add_never_removes() {
    let api = RecordingRelationship::failing_add(&[USER_A]);

    let result = reconcile(&api, GROUP_ID, &[USER_B]).await;

    assert!(result.is_err());
    assert_eq!(api.calls(), vec![Call::List, Call::Add(vec![USER_B.into()])]);
    assert_eq!(api.members(), vec![USER_A]);
}

#[test]
fn delta_deduplicates_desired_ids() {
    let delta = SetDelta::compute(&[] as &[&str], &[USER_A, USER_A, &USER_A.to_uppercase()]);
    assert_eq!(delta.to_add, vec![USER_A]);
}

#[tokio::test]
async fn reconciling_twice_is_idempotent() {
    let api = RecordingRelationship::new(&[USER_A]);

    reconcile(&api, GROUP_ID, &[USER_B, USER_C]).await.unwrap();
    let second = reconcile(&api, GROUP_ID, &[USER_B, USER_C]).await.unwrap();

    assert!(second.is_empty());
}
