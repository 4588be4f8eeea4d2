//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes are visible, aborted writes are discarded, and a snapshot
//! that fails to commit leaves nothing behind.

use std::future::Future;

use super::{make_audit, make_write, seed, transition, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_insert_invisible",
        uncommitted_insert_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "aborted_insert_invisible",
        aborted_insert_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "staged_update_visible_within_snapshot",
        staged_update_visible_within_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "update_and_audit_visible_after_commit",
        update_and_audit_visible_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "update_and_audit_discarded_on_abort",
        update_and_audit_discarded_on_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "conflicting_snapshot_applies_nothing",
        conflicting_snapshot_applies_nothing(factory).await,
    ));

    results
}

async fn uncommitted_insert_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_instance(&mut snap, "inst-1", make_write("CREATED"))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let outside = storage.get_instance("inst-1").await;
    let _ = storage.abort_snapshot(snap).await;
    match outside {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got {e}")),
        Ok(_) => Err("uncommitted insert visible outside snapshot".to_string()),
    }
}

async fn aborted_insert_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_instance(&mut snap, "inst-1", make_write("CREATED"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match storage.get_instance("inst-1").await {
        Err(StorageError::InstanceNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected InstanceNotFound, got {e}")),
        Ok(_) => Err("aborted insert is visible".to_string()),
    }
}

async fn staged_update_visible_within_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
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
    storage
        .update_instance(&mut snap, "inst-1", 0, make_write("SIGNED_BY_INITIATOR"))
        .await
        .map_err(|e| format!("update: {e}"))?;
    let inside = storage.get_instance_for_update(&mut snap, "inst-1").await;
    let _ = storage.abort_snapshot(snap).await;

    let inside = inside.map_err(|e| format!("get_for_update: {e}"))?;
    if inside.state != "SIGNED_BY_INITIATOR" || inside.version != 1 {
        return Err(format!(
            "expected staged SIGNED_BY_INITIATOR@1, got {}@{}",
            inside.state, inside.version
        ));
    }
    Ok(())
}

async fn update_and_audit_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    transition(&storage, "inst-1", 0, "SIGNED_BY_INITIATOR")
        .await
        .map_err(|e| format!("transition: {e}"))?;

    let record = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.state != "SIGNED_BY_INITIATOR" || record.version != 1 {
        return Err(format!(
            "expected SIGNED_BY_INITIATOR@1, got {}@{}",
            record.state, record.version
        ));
    }
    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    if log.len() != 1 {
        return Err(format!("expected 1 audit entry, got {}", log.len()));
    }
    Ok(())
}

async fn update_and_audit_discarded_on_abort<S, F, Fut>(factory: &F) -> Result<(), String>
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
    storage
        .update_instance(&mut snap, "inst-1", 0, make_write("SIGNED_BY_INITIATOR"))
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .append_audit(&mut snap, "inst-1", make_audit("sign_initiator", "E1"))
        .await
        .map_err(|e| format!("append: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let record = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.state != "CREATED" || record.version != 0 {
        return Err(format!(
            "abort leaked update: {}@{}",
            record.state, record.version
        ));
    }
    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    if !log.is_empty() {
        return Err(format!("abort leaked {} audit entries", log.len()));
    }
    Ok(())
}

/// A snapshot that loses an OCC race on one instance must not apply its
/// writes to any other instance.
async fn conflicting_snapshot_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    seed(&storage, "inst-2", "CREATED").await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .update_instance(&mut snap, "inst-1", 0, make_write("SIGNED_BY_INITIATOR"))
        .await
        .map_err(|e| format!("update inst-1: {e}"))?;

    // Another writer moves inst-2 on before this snapshot touches it.
    transition(&storage, "inst-2", 0, "SIGNED_BY_INITIATOR")
        .await
        .map_err(|e| format!("intervening transition: {e}"))?;

    let staged = storage
        .update_instance(&mut snap, "inst-2", 0, make_write("REJECTED"))
        .await;
    let outcome = match staged {
        Ok(_) => storage.commit_snapshot(snap).await,
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            Err(e)
        }
    };
    match outcome {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => return Err("stale update committed".to_string()),
    }

    let first = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get inst-1: {e}"))?;
    if first.version != 0 || first.state != "CREATED" {
        return Err(format!(
            "inst-1 changed by a failed snapshot: {}@{}",
            first.state, first.version
        ));
    }
    Ok(())
}
