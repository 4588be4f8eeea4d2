use std::future::Future;

use super::{make_write, seed, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_creates_instance_at_version_0",
        insert_creates_instance_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_keeps_state_and_document",
        insert_keeps_state_and_document(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_insert_across_snapshots",
        double_insert_across_snapshots(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_insert_in_one_snapshot",
        double_insert_in_one_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "list_instances_filters_by_state",
        list_instances_filters_by_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "new_instance_has_empty_audit_log",
        new_instance_has_empty_audit_log(factory).await,
    ));

    results
}

async fn insert_creates_instance_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    let record = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.version != 0 {
        return Err(format!("expected version 0, got {}", record.version));
    }
    Ok(())
}

async fn insert_keeps_state_and_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    let record = storage
        .get_instance("inst-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.state != "CREATED" {
        return Err(format!("expected state CREATED, got {}", record.state));
    }
    if record.document != make_write("CREATED").document {
        return Err(format!("document changed on insert: {}", record.document));
    }
    if record.instance_id != "inst-1" {
        return Err(format!("wrong instance id {}", record.instance_id));
    }
    Ok(())
}

async fn double_insert_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = storage
        .insert_instance(&mut snap, "inst-1", make_write("CREATED"))
        .await;
    let result = match result {
        Ok(()) => storage.commit_snapshot(snap).await,
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            Err(e)
        }
    };
    match result {
        Err(StorageError::AlreadyExists { instance_id }) if instance_id == "inst-1" => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("second insert succeeded".to_string()),
    }
}

async fn double_insert_in_one_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("first insert: {e}"))?;
    let second = storage
        .insert_instance(&mut snap, "inst-1", make_write("CREATED"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match second {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("second insert in the same snapshot succeeded".to_string()),
    }
}

async fn list_instances_filters_by_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    seed(&storage, "inst-2", "REJECTED").await?;
    seed(&storage, "inst-3", "CREATED").await?;

    let all = storage
        .list_instances(None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if all.len() != 3 {
        return Err(format!("expected 3 instances, got {}", all.len()));
    }
    let created = storage
        .list_instances(Some("CREATED"))
        .await
        .map_err(|e| format!("list filtered: {e}"))?;
    let ids: Vec<&str> = created.iter().map(|r| r.instance_id.as_str()).collect();
    if ids != ["inst-1", "inst-3"] {
        return Err(format!("expected [inst-1, inst-3], got {ids:?}"));
    }
    Ok(())
}

async fn new_instance_has_empty_audit_log<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage, "inst-1", "CREATED").await?;
    let log = storage
        .list_audit("inst-1")
        .await
        .map_err(|e| format!("list_audit: {e}"))?;
    if !log.is_empty() {
        return Err(format!("expected empty audit log, got {} entries", log.len()));
    }
    Ok(())
}
