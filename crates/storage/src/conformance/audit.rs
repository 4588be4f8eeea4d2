//! Audit log conformance tests.
//!
//! Verifies sequence assignment, digest chaining, and that audit appends
//! travel with the snapshot they were staged in.

use std::future::Future;

use super::{make_audit, seed, transition, TestResult};
use crate::{chain_digest, WorkflowStorage};

pub(super) async fn run_audit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "audit",
        "sequences_start_at_one_and_increment",
        sequences_start_at_one_and_increment(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "digests_chain_to_previous_entry",
        digests_chain_to_previous_entry(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "appends_in_one_snapshot_are_sequential",
        appends_in_one_snapshot_are_sequential(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "append_preserves_fields",
        append_preserves_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "audit",
        "logs_are_per_instance",
        logs_are_per_instance(factory).await,
    ));

    results
}

async fn sequences_start_at_one_and_increment<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    for v in 0..3 {
        transition(&storage, "inst-1", v, "SIGNED_BY_INITIATOR")
            .await
            .map_err(|e| format!("transition {v}: {e}"))?;
    }
    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    let sequences: Vec<i64> = log.iter().map(|r| r.sequence).collect();
    if sequences != [1, 2, 3] {
        return Err(format!("expected sequences [1, 2, 3], got {sequences:?}"));
    }
    Ok(())
}

async fn digests_chain_to_previous_entry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    for v in 0..3 {
        transition(&storage, "inst-1", v, "SIGNED_BY_INITIATOR")
            .await
            .map_err(|e| format!("transition {v}: {e}"))?;
    }
    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;

    let mut previous: Option<String> = None;
    for record in &log {
        let expected = chain_digest(
            previous.as_deref(),
            &record.instance_id,
            record.sequence,
            &record.action,
            &record.actor_id,
            &record.recorded_at,
            &record.payload,
        );
        if record.digest != expected {
            return Err(format!(
                "entry {} digest {} does not chain (expected {expected})",
                record.sequence, record.digest
            ));
        }
        previous = Some(record.digest.clone());
    }
    Ok(())
}

async fn appends_in_one_snapshot_are_sequential<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let first = storage
        .append_audit(&mut snap, "inst-1", make_audit("sign_initiator", "E1"))
        .await
        .map_err(|e| format!("first append: {e}"))?;
    let second = storage
        .append_audit(&mut snap, "inst-1", make_audit("sign_counterparty", "E2"))
        .await
        .map_err(|e| format!("second append: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    if first.sequence != 1 || second.sequence != 2 {
        return Err(format!(
            "expected sequences 1 and 2, got {} and {}",
            first.sequence, second.sequence
        ));
    }
    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    if log != vec![first, second] {
        return Err("committed log differs from the records returned by append".to_string());
    }
    Ok(())
}

async fn append_preserves_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    let entry = make_audit("reject", "M1");
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .append_audit(&mut snap, "inst-1", entry.clone())
        .await
        .map_err(|e| format!("append: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    let record = log.first().ok_or("audit log is empty")?;
    if record.action != entry.action
        || record.actor_id != entry.actor_id
        || record.recorded_at != entry.recorded_at
        || record.payload != entry.payload
    {
        return Err(format!("stored record differs from appended entry: {record:?}"));
    }
    Ok(())
}

async fn logs_are_per_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    seed(&storage, "inst-2", "CREATED").await?;
    transition(&storage, "inst-1", 0, "SIGNED_BY_INITIATOR")
        .await
        .map_err(|e| format!("inst-1: {e}"))?;
    transition(&storage, "inst-2", 0, "SIGNED_BY_INITIATOR")
        .await
        .map_err(|e| format!("inst-2: {e}"))?;

    let second = storage
        .list_audit("inst-2")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    match second.as_slice() {
        [only] if only.sequence == 1 && only.instance_id == "inst-2" => Ok(()),
        other => Err(format!("expected one inst-2 entry at sequence 1, got {other:?}")),
    }
}
