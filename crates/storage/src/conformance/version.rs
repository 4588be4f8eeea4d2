use std::future::Future;

use super::{make_write, seed, transition, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "each_commit_bumps_version_by_one",
        each_commit_bumps_version_by_one(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "mismatched_version_is_a_conflict",
        mismatched_version_is_a_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "writer_holding_old_version_loses",
        writer_holding_old_version_loses(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "two_updates_in_one_snapshot_chain_versions",
        two_updates_in_one_snapshot_chain_versions(factory).await,
    ));

    results
}

async fn each_commit_bumps_version_by_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    for expected in 0..3 {
        let version = transition(&storage, "inst-1", expected, "SIGNED_BY_INITIATOR")
            .await
            .map_err(|e| format!("transition from {expected}: {e}"))?;
        if version != expected + 1 {
            return Err(format!("expected version {}, got {version}", expected + 1));
        }
    }
    let record = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.version != 3 {
        return Err(format!("expected stored version 3, got {}", record.version));
    }
    Ok(())
}

async fn mismatched_version_is_a_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    match transition(&storage, "inst-1", 5, "SIGNED_BY_INITIATOR").await {
        Err(StorageError::ConcurrentConflict {
            instance_id,
            expected_version,
        }) => {
            if instance_id != "inst-1" || expected_version != 5 {
                return Err(format!(
                    "conflict carries wrong fields: {instance_id}/{expected_version}"
                ));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(v) => Err(format!("update with wrong version succeeded (v{v})")),
    }
}

async fn writer_holding_old_version_loses<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    transition(&storage, "inst-1", 0, "SIGNED_BY_INITIATOR")
        .await
        .map_err(|e| format!("first transition: {e}"))?;
    match transition(&storage, "inst-1", 0, "REJECTED").await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(_) => Err("stale update succeeded".to_string()),
    }
}

async fn two_updates_in_one_snapshot_chain_versions<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .update_instance(&mut snap, "inst-1", 0, make_write("SIGNED_BY_INITIATOR"))
        .await
        .map_err(|e| format!("first update: {e}"))?;
    let second = storage
        .update_instance(&mut snap, "inst-1", first, make_write("SIGNED_BY_COUNTERPARTY"))
        .await
        .map_err(|e| format!("second update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    let record = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if second != 2 || record.version != 2 || record.state != "SIGNED_BY_COUNTERPARTY" {
        return Err(format!(
            "expected SIGNED_BY_COUNTERPARTY@2, got {}@{} (returned {second})",
            record.state, record.version
        ));
    }
    Ok(())
}
