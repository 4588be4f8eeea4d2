//! End-to-end workflow behavior against in-memory storage.

mod common;

use common::harness;
use signoff_engine::{
    Action, ActionRequest, AuditAction, Badge, TaskStatus, WorkflowError, WorkflowState,
};
use time::Duration;

// ──────────────────────────────────────────────
// Main scenario
// ──────────────────────────────────────────────

#[tokio::test]
async fn handover_scenario_runs_to_taken_over() {
    let h = harness();
    let id = h.create(&["Return badge"]).await;

    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();
    let err = h
        .act(&id, "E2", Action::SignInitiator, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::WrongRole { .. }), "{err}");
    h.act(&id, "E2", Action::SignCounterparty, None).await.unwrap();
    h.act(&id, "M1", Action::RequestClarification, Some("need dates"))
        .await
        .unwrap();
    h.act(&id, "E1", Action::Resubmit, Some("dates added"))
        .await
        .unwrap();
    h.act(&id, "M1", Action::Approve, None).await.unwrap();
    let outcome = h.act(&id, "E2", Action::TakeOver, None).await.unwrap();

    assert_eq!(outcome.snapshot.state, WorkflowState::TakenOver);
    assert_eq!(outcome.snapshot.projected.badge, Badge::InHandover);
    let log = h.engine.get_audit_log(&id).await.unwrap();
    assert_eq!(log.len(), 6);
    assert_eq!(
        log.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![2, 3, 4, 5, 6, 7]
    );
    assert_eq!(log[3].comment.as_deref(), Some("dates added"));
    assert!(log.iter().all(|e| !e.is_override));
    assert!(outcome.snapshot.stamps.is_ordered());
}

// ──────────────────────────────────────────────
// Transition properties
// ──────────────────────────────────────────────

#[tokio::test]
async fn initiator_cannot_sign_twice() {
    let h = harness();
    let id = h.create(&[]).await;
    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();
    let err = h
        .act(&id, "E1", Action::SignInitiator, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }), "{err}");
    assert_eq!(h.engine.get_audit_log(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reject_requires_reason() {
    let h = harness();
    let id = h.countersigned(&[]).await;

    let err = h
        .act(&id, "M1", Action::Reject, Some(""))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingComment { .. }));
    assert_eq!(err.to_string(), "comment is required to reject");

    let outcome = h
        .act(&id, "M1", Action::Reject, Some("budget"))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.state, WorkflowState::Rejected);
    assert_eq!(outcome.snapshot.rejection_reason.as_deref(), Some("budget"));
    assert_eq!(outcome.audit_entry.comment.as_deref(), Some("budget"));
}

#[tokio::test]
async fn clarification_round_trip_clears_comment_on_approve() {
    let h = harness();
    let id = h.countersigned(&[]).await;

    let outcome = h
        .act(&id, "M1", Action::RequestClarification, Some("need dates"))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.state, WorkflowState::NeedClarification);
    assert_eq!(
        outcome.snapshot.clarification_comment.as_deref(),
        Some("need dates")
    );

    let outcome = h
        .act(&id, "E1", Action::Resubmit, Some("dates added"))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.state, WorkflowState::Resubmitted);
    assert_eq!(outcome.snapshot.clarification_comment, None);

    let outcome = h.act(&id, "M1", Action::Approve, None).await.unwrap();
    assert_eq!(outcome.snapshot.state, WorkflowState::ApprovedBySupervisor);
    assert_eq!(outcome.snapshot.clarification_comment, None);
    assert!(outcome.snapshot.stamps.supervisor_approved_at.is_some());
}

#[tokio::test]
async fn resubmit_without_response_is_missing_comment() {
    let h = harness();
    let id = h.countersigned(&[]).await;
    h.act(&id, "M1", Action::RequestClarification, Some("why?"))
        .await
        .unwrap();
    let err = h
        .act(&id, "E1", Action::Resubmit, Some("   "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "missing_comment");
}

#[tokio::test]
async fn approve_before_countersignature_is_precondition_failure() {
    let h = harness();
    let id = h.create(&[]).await;
    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();
    let err = h.act(&id, "M1", Action::Approve, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }), "{err}");
    let snapshot = h.engine.get_snapshot(&id).await.unwrap();
    assert_eq!(snapshot.stamps.supervisor_approved_at, None);
}

#[tokio::test]
async fn rejected_instance_is_terminal() {
    let h = harness();
    let id = h.countersigned(&["Return badge"]).await;
    h.act(&id, "M1", Action::Reject, Some("budget")).await.unwrap();

    let err = h.act(&id, "M1", Action::Approve, None).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AlreadyTerminal {
            state: WorkflowState::Rejected
        }
    ));
    let err = h
        .engine
        .update_task_status(&id, 1, "E2", TaskStatus::Completed, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "already_terminal");
}

// ──────────────────────────────────────────────
// Administrator overrides
// ──────────────────────────────────────────────

#[tokio::test]
async fn administrator_countersignature_is_audited_as_override() {
    let h = harness();
    let id = h.create(&[]).await;
    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();

    let outcome = h
        .act(&id, "HR", Action::SignCounterparty, None)
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.state, WorkflowState::SignedByCounterparty);
    assert!(outcome.snapshot.stamps.counterparty_signed_at.is_some());
    assert!(outcome.audit_entry.is_override);
    assert_eq!(outcome.audit_entry.actor_id, "HR");
}

#[tokio::test]
async fn administrator_cannot_skip_a_step() {
    let h = harness();
    let id = h.create(&[]).await;
    let err = h.act(&id, "HR", Action::Approve, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
}

#[tokio::test]
async fn reopen_returns_rejected_instance_to_draft() {
    let h = harness();
    let id = h.countersigned(&[]).await;
    h.act(&id, "M1", Action::Reject, Some("budget")).await.unwrap();

    let err = h.act(&id, "E1", Action::Reopen, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::WrongRole { .. }));

    let outcome = h.act(&id, "HR", Action::Reopen, None).await.unwrap();
    assert_eq!(outcome.snapshot.state, WorkflowState::Created);
    assert_eq!(outcome.snapshot.rejection_reason, None);
    assert_eq!(outcome.snapshot.stamps.initiator_signed_at, None);
    assert!(outcome.audit_entry.is_override);

    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();
}

#[tokio::test]
async fn supervisor_reassignment_before_approval() {
    let h = harness();
    let id = h.countersigned(&[]).await;

    let err = h
        .engine
        .reassign_supervisor(&id, "E1", "M2", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::WrongRole { .. }));

    let outcome = h
        .engine
        .reassign_supervisor(&id, "HR", "M2", Some("M1 on leave"))
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.parties.supervisor_id, "M2");
    assert_eq!(outcome.snapshot.state, WorkflowState::SignedByCounterparty);
    assert!(outcome.audit_entry.is_override);
    assert_eq!(
        outcome.audit_entry.action,
        AuditAction::ReassignSupervisor {
            previous: "M1".to_string(),
            replacement: "M2".to_string(),
        }
    );

    let err = h.act(&id, "M1", Action::Approve, None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::WrongRole { .. }));
    h.act(&id, "M2", Action::Approve, None).await.unwrap();

    let err = h
        .engine
        .reassign_supervisor(&id, "HR", "M3", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
}

// ──────────────────────────────────────────────
// Tasks
// ──────────────────────────────────────────────

#[tokio::test]
async fn task_updates_never_change_workflow_state() {
    let h = harness();
    let id = h.countersigned(&["Return badge", "Hand over keys"]).await;
    let before = h.engine.get_snapshot(&id).await.unwrap();

    h.clock.advance(Duration::hours(1)).unwrap();
    let update = h
        .engine
        .update_task_status(&id, 1, "E2", TaskStatus::InProgress, Some("at reception"))
        .await
        .unwrap();
    assert_eq!(update.snapshot.state, before.state);
    assert_eq!(update.task.current_status, TaskStatus::InProgress);
    assert_eq!(update.activity.comment.as_deref(), Some("at reception"));
    assert!(update.snapshot.last_activity_at > before.last_activity_at);
    assert_eq!(
        update.snapshot.task(2).unwrap().current_status,
        TaskStatus::NotStarted
    );
    assert_eq!(h.engine.get_audit_log(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn administrator_task_update_is_override() {
    let h = harness();
    let id = h.create(&["Return badge"]).await;
    let update = h
        .engine
        .update_task_status(&id, 1, "HR", TaskStatus::Canceled, None)
        .await
        .unwrap();
    assert!(update.activity.is_override);

    let err = h
        .engine
        .update_task_status(&id, 1, "M1", TaskStatus::Completed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::WrongRole { .. }));
}

#[tokio::test]
async fn tasks_can_be_added_and_removed_only_while_draft() {
    let h = harness();
    let id = h.create(&["Return badge"]).await;

    let outcome = h.engine.add_task(&id, "E1", "Hand over keys").await.unwrap();
    assert_eq!(outcome.snapshot.tasks.len(), 2);
    assert_eq!(
        outcome.audit_entry.action,
        AuditAction::AddTask {
            task_id: 2,
            description: "Hand over keys".to_string(),
        }
    );

    let err = h.engine.add_task(&id, "E1", "  ").await.unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
    let err = h.engine.add_task(&id, "E2", "Archive").await.unwrap_err();
    assert!(matches!(err, WorkflowError::WrongRole { .. }));

    h.engine
        .update_task_status(&id, 1, "E2", TaskStatus::InProgress, None)
        .await
        .unwrap();
    let err = h.engine.remove_task(&id, 1, "E1").await.unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
    let outcome = h.engine.remove_task(&id, 2, "E1").await.unwrap();
    assert_eq!(outcome.snapshot.tasks.len(), 1);

    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();
    let err = h.engine.add_task(&id, "E1", "Late task").await.unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
}

// ──────────────────────────────────────────────
// Versions, time and reads
// ──────────────────────────────────────────────

#[tokio::test]
async fn stale_expected_version_is_concurrent_modification() {
    let h = harness();
    let id = h.create(&[]).await;
    let seen = h.engine.get_snapshot(&id).await.unwrap();
    assert_eq!(seen.version, 0);

    h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();

    let err = h
        .engine
        .apply_action(
            ActionRequest::new(&id, "E2", Action::SignCounterparty)
                .with_expected_version(seen.version),
        )
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.kind(), "concurrent_modification");

    let fresh = h.engine.get_snapshot(&id).await.unwrap();
    let outcome = h
        .engine
        .apply_action(
            ActionRequest::new(&id, "E2", Action::SignCounterparty)
                .with_expected_version(fresh.version),
        )
        .await
        .unwrap();
    assert_eq!(outcome.snapshot.version, fresh.version + 1);
}

#[tokio::test]
async fn clock_stepping_back_never_reorders_stamps() {
    let h = harness();
    let id = h.create(&[]).await;
    let signed = h.act(&id, "E1", Action::SignInitiator, None).await.unwrap();
    h.clock.advance(Duration::days(-3)).unwrap();

    let outcome = h
        .engine
        .apply_action(ActionRequest::new(&id, "E2", Action::SignCounterparty))
        .await
        .unwrap();
    assert_eq!(
        outcome.snapshot.stamps.counterparty_signed_at,
        signed.snapshot.stamps.initiator_signed_at
    );
    assert!(outcome.snapshot.stamps.is_ordered());
}

#[tokio::test]
async fn idle_instance_is_projected_overdue() {
    let h = harness();
    let id = h.create(&[]).await;
    h.clock.advance(Duration::days(15)).unwrap();
    let snapshot = h.engine.get_snapshot(&id).await.unwrap();
    assert_eq!(snapshot.projected.overdue_days, Some(15));
    assert!(snapshot
        .projected
        .hint
        .starts_with("overdue: no action since 15 days"));
}

#[tokio::test]
async fn unknown_instance_is_not_found() {
    let h = harness();
    let err = h.engine.get_snapshot("missing").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { kind: "instance", .. }));
    let err = h
        .act("missing", "E1", Action::SignInitiator, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn list_instances_filters_by_state() {
    let h = harness();
    let draft = h.create(&[]).await;
    let signed = h.countersigned(&[]).await;

    let all = h.engine.list_instances(None).await.unwrap();
    assert_eq!(all.len(), 2);
    let review = h
        .engine
        .list_instances(Some(WorkflowState::SignedByCounterparty))
        .await
        .unwrap();
    assert_eq!(
        review.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        vec![signed.as_str()]
    );
    let drafts = h
        .engine
        .list_instances(Some(WorkflowState::Created))
        .await
        .unwrap();
    assert_eq!(drafts[0].id, draft);
}

#[tokio::test]
async fn allowed_actions_follow_roles() {
    let h = harness();
    let id = h.countersigned(&[]).await;
    assert_eq!(
        h.engine.allowed_actions(&id, "M1").await.unwrap(),
        vec![Action::Approve, Action::Reject, Action::RequestClarification]
    );
    assert!(h.engine.allowed_actions(&id, "E1").await.unwrap().is_empty());
    assert!(h.engine.roles_of(&id, "HR").await.unwrap().is_administrator());
}

#[tokio::test]
async fn empty_party_id_is_rejected_at_creation() {
    let h = harness();
    let err = h
        .engine
        .create_instance(signoff_engine::Parties::new("E1", " ", "M1"), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PreconditionNotMet { .. }));
}
