use std::future::Future;
use std::sync::Arc;

use super::{seed, transition, TestResult};
use crate::{StorageError, WorkflowStorage};

/// Writers racing in each check.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "racing_signatures_single_winner",
        racing_signatures_single_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "racing_creations_single_winner",
        racing_creations_single_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "independent_instances_never_conflict",
        independent_instances_never_conflict(factory).await,
    ));

    results
}

// ── Concurrent transition: exactly one wins ─────────────────────────────────

/// N tasks each try to move the same instance on from version 0. Exactly one
/// commit succeeds; the rest get ConcurrentConflict, and the audit log holds
/// only the winner's entry.
async fn racing_signatures_single_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "inst-1", "SIGNED_BY_COUNTERPARTY").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let target = if i % 2 == 0 {
            "APPROVED_BY_SUPERVISOR"
        } else {
            "REJECTED"
        };
        handles.push(tokio::spawn(async move {
            match transition(s.as_ref(), "inst-1", 0, target).await {
                Ok(_) => Ok(true),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
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

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

async fn racing_creations_single_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match seed(s.as_ref(), "inst-1", "CREATED").await {
                Ok(()) => true,
                Err(msg) if msg.contains("already exists") => false,
                Err(msg) => panic!("unexpected insert failure: {msg}"),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        if handle.await.map_err(|e| format!("task panic: {e}"))? {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 successful insert, got {winners}"));
    }
    Ok(())
}

// ── Different instances: no interference ────────────────────────────────────

async fn independent_instances_never_conflict<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed(storage.as_ref(), &format!("inst-{i}"), "CREATED").await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            transition(s.as_ref(), &format!("inst-{i}"), 0, "SIGNED_BY_INITIATOR").await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("transition failed: {e}"))?;
    }

    let signed = storage
        .list_instances(Some("SIGNED_BY_INITIATOR"))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if signed.len() != N {
        return Err(format!("expected {N} signed instances, got {}", signed.len()));
    }
    Ok(())
}
