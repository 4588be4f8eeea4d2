//! Runs the backend conformance suite against the bundled in-memory storage.

use signoff_storage::conformance::run_conformance_suite;
use signoff_storage::MemoryStorage;

#[tokio::test]
async fn memory_storage_passes_conformance_suite() {
    let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
    assert_eq!(report.failed, 0, "{report}");
    assert!(report.total >= 25, "suite shrank unexpectedly: {report}");
}

#[tokio::test]
async fn clones_share_committed_data() {
    use signoff_storage::{InstanceWrite, WorkflowStorage};

    let storage = MemoryStorage::new();
    let other = storage.clone();
    let mut snap = storage.begin_snapshot().await.unwrap();
    storage
        .insert_instance(
            &mut snap,
            "inst-1",
            InstanceWrite {
                state: "CREATED".to_string(),
                updated_at: "2025-01-01T00:00:00Z".to_string(),
                document: serde_json::json!({}),
            },
        )
        .await
        .unwrap();
    storage.commit_snapshot(snap).await.unwrap();

    assert_eq!(other.get_instance("inst-1").await.unwrap().state, "CREATED");
}
