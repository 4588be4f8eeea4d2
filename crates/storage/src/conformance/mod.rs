//! Behavioural checks shared by every `WorkflowStorage` backend.
//!
//! Each check gets a fresh store from the caller's factory and returns a
//! [`TestResult`] instead of panicking, so a backend test can print every
//! broken guarantee at once. The groups are instance creation, error
//! variants, snapshot visibility, version conflicts, the audit chain and
//! racing writers.
//!
//! ```ignore
//! #[tokio::test]
//! async fn sqlite_backend_conforms() {
//!     let report = signoff_storage::conformance::run_conformance_suite(|| async {
//!         SqliteStorage::open_in_memory().await.unwrap()
//!     })
//!     .await;
//!     assert_eq!(report.failed, 0, "{report}");
//! }
//! ```

mod audit;
mod concurrent;
mod error;
mod init;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use crate::record::{InstanceWrite, NewAuditRecord};
use crate::{StorageError, WorkflowStorage};

/// Outcome of one check.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Group the check belongs to, such as `"audit"`.
    pub category: String,
    pub name: String,
    pub passed: bool,
    /// What went wrong, for failed checks.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Tally of a full run. `Display` lists only the failures.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} storage checks passed, {} failing",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  {}::{} failed: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("no details")
                )?;
            }
        }
        Ok(())
    }
}

/// Run every check, calling `factory` for a new empty store each time.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(audit::run_audit_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors and one-shot transactions ───────────────────

fn make_write(state: &str) -> InstanceWrite {
    InstanceWrite {
        state: state.to_string(),
        updated_at: "2025-01-01T00:00:00Z".to_string(),
        document: serde_json::json!({ "state": state }),
    }
}

fn make_audit(action: &str, actor_id: &str) -> NewAuditRecord {
    NewAuditRecord {
        action: action.to_string(),
        actor_id: actor_id.to_string(),
        recorded_at: "2025-01-01T00:00:30Z".to_string(),
        payload: serde_json::json!({ "action": action, "actor_id": actor_id }),
    }
}

/// Insert and commit an instance at version 0.
async fn seed<S: WorkflowStorage>(
    storage: &S,
    instance_id: &str,
    state: &str,
) -> Result<(), String> {
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_instance(&mut snap, instance_id, make_write(state))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit insert: {e}"))
}

/// Update an instance and append one audit entry in a single committed snapshot.
async fn transition<S: WorkflowStorage>(
    storage: &S,
    instance_id: &str,
    expected_version: i64,
    new_state: &str,
) -> Result<i64, StorageError> {
    let mut snap = storage.begin_snapshot().await?;
    let version = match storage
        .update_instance(&mut snap, instance_id, expected_version, make_write(new_state))
        .await
    {
        Ok(v) => v,
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            return Err(e);
        }
    };
    if let Err(e) = storage
        .append_audit(&mut snap, instance_id, make_audit(new_state, "actor"))
        .await
    {
        let _ = storage.abort_snapshot(snap).await;
        return Err(e);
    }
    storage.commit_snapshot(snap).await?;
    Ok(version)
}
