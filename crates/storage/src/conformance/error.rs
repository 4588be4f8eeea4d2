use std::future::Future;

use super::{make_audit, make_write, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_instance_nonexistent",
        get_instance_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_instance_for_update_nonexistent",
        get_instance_for_update_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_instance_nonexistent",
        update_instance_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "append_audit_nonexistent",
        append_audit_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_audit_nonexistent",
        list_audit_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_instances_empty_storage",
        list_instances_empty_storage(factory).await,
    ));

    results
}

fn expect_not_found<T>(result: Result<T, StorageError>, what: &str) -> Result<(), String> {
    match result {
        Err(StorageError::InstanceNotFound { instance_id }) if instance_id == "missing" => Ok(()),
        Err(StorageError::InstanceNotFound { instance_id }) => Err(format!(
            "{what}: InstanceNotFound carries wrong id '{instance_id}'"
        )),
        Err(e) => Err(format!("{what}: expected InstanceNotFound, got {e}")),
        Ok(_) => Err(format!("{what}: expected InstanceNotFound, got Ok")),
    }
}

async fn get_instance_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    expect_not_found(storage.get_instance("missing").await, "get_instance")
}

async fn get_instance_for_update_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = storage.get_instance_for_update(&mut snap, "missing").await;
    let _ = storage.abort_snapshot(snap).await;
    expect_not_found(result, "get_instance_for_update")
}

async fn update_instance_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = storage
        .update_instance(&mut snap, "missing", 0, make_write("SIGNED_BY_INITIATOR"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    expect_not_found(result, "update_instance")
}

async fn append_audit_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = storage
        .append_audit(&mut snap, "missing", make_audit("sign_initiator", "E1"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    expect_not_found(result, "append_audit")
}

async fn list_audit_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    expect_not_found(storage.list_audit("missing").await, "list_audit")
}

async fn list_instances_empty_storage<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let all = storage
        .list_instances(None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !all.is_empty() {
        return Err(format!("expected no instances, got {}", all.len()));
    }
    Ok(())
}
