//! The workflow engine.
//!
//! Every mutation runs under the instance's lock and inside one storage
//! snapshot: read for update, check the caller's expected version, apply the
//! change to a copy of the instance, write the document and its audit entry,
//! commit. Notifications go out after the commit and only on success.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use signoff_storage::{InstanceRecord, InstanceWrite, WorkflowStorage};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::audit::{format_timestamp, AuditAction, AuditDraft, AuditEntry, AuditLog};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::directory::{ActorDirectory, StaticDirectory};
use crate::error::WorkflowError;
use crate::guard::TransitionGuard;
use crate::instance::{Genesis, Parties, Stamps, WorkflowInstance};
use crate::lock::InstanceLocks;
use crate::notify::{NoopSink, NotificationSink, WorkflowEvent};
use crate::projection::{project, ProjectedStatus, ProjectionPolicy};
use crate::role::{ActorClaims, Role, RoleResolver, RoleSet};
use crate::state::{Action, WorkflowState};
use crate::task::{normalize_comment, TaskActivity, TaskChange, TaskId, TaskRecord, TaskStatus};

/// A request to apply one workflow-level action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub instance_id: String,
    pub actor_id: String,
    pub action: Action,
    #[serde(default)]
    pub comment: Option<String>,
    /// Version of the snapshot the caller acted on. A mismatch fails with
    /// `ConcurrentModification` before any guard runs.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl ActionRequest {
    pub fn new(instance_id: &str, actor_id: &str, action: Action) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            actor_id: actor_id.to_string(),
            action,
            comment: None,
            expected_version: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// The public view of an instance at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub version: i64,
    pub state: WorkflowState,
    pub parties: Parties,
    pub stamps: Stamps,
    pub rejection_reason: Option<String>,
    pub clarification_comment: Option<String>,
    pub tasks: Vec<TaskRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    pub projected: ProjectedStatus,
}

impl InstanceSnapshot {
    fn new(
        instance: &WorkflowInstance,
        version: i64,
        now: OffsetDateTime,
        policy: &ProjectionPolicy,
    ) -> Self {
        Self {
            id: instance.id.clone(),
            version,
            state: instance.state,
            parties: instance.parties.clone(),
            stamps: instance.stamps.clone(),
            rejection_reason: instance.rejection_reason.clone(),
            clarification_comment: instance.clarification_comment.clone(),
            tasks: instance.tasks.iter().cloned().collect(),
            created_at: instance.created_at,
            last_activity_at: instance.last_activity_at,
            projected: project(instance, now, policy),
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub snapshot: InstanceSnapshot,
    pub audit_entry: AuditEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub snapshot: InstanceSnapshot,
    pub task: TaskRecord,
    pub activity: TaskActivity,
}

/// Result of a successful history check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedHistory {
    pub instance_id: String,
    pub version: i64,
    /// Workflow-level entries, as `get_audit_log` returns them.
    pub entries: usize,
    /// Task status updates replayed from the same chain.
    pub task_activities: usize,
    pub head_digest: Option<String>,
}

/// What one mutation produced, before it is committed.
struct Change<T> {
    audit: AuditDraft,
    event: WorkflowEvent,
    output: T,
}

struct Committed<T> {
    instance: WorkflowInstance,
    version: i64,
    audit: AuditEntry,
    output: T,
}

pub struct WorkflowEngine<S, D = StaticDirectory, N = NoopSink> {
    storage: S,
    directory: D,
    sink: N,
    clock: Arc<dyn Clock>,
    policy: ProjectionPolicy,
    locks: InstanceLocks,
}

impl<S, N> WorkflowEngine<S, StaticDirectory, N>
where
    S: WorkflowStorage,
    N: NotificationSink,
{
    /// Build an engine whose administrators and overdue policy come from
    /// `config`.
    pub fn from_config(storage: S, config: &EngineConfig, sink: N) -> Self {
        Self::new(storage, config.directory(), sink).with_policy(config.policy())
    }
}

impl<S, D, N> WorkflowEngine<S, D, N>
where
    S: WorkflowStorage,
    D: ActorDirectory,
    N: NotificationSink,
{
    pub fn new(storage: S, directory: D, sink: N) -> Self {
        Self {
            storage,
            directory,
            sink,
            clock: Arc::new(SystemClock),
            policy: ProjectionPolicy::default(),
            locks: InstanceLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_policy(mut self, policy: ProjectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn policy(&self) -> &ProjectionPolicy {
        &self.policy
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    #[instrument(skip(self, parties, tasks), fields(initiator = %parties.initiator_id))]
    pub async fn create_instance(
        &self,
        parties: Parties,
        tasks: Vec<String>,
    ) -> Result<String, WorkflowError> {
        for (role, id) in [
            (Role::Initiator, &parties.initiator_id),
            (Role::Counterparty, &parties.counterparty_id),
            (Role::Supervisor, &parties.supervisor_id),
        ] {
            if id.trim().is_empty() {
                return Err(WorkflowError::PreconditionNotMet {
                    action: "create".to_string(),
                    reason: format!("{} id must not be empty", role),
                });
            }
        }
        let tasks = tasks
            .into_iter()
            .map(|d| {
                normalize_comment(Some(&d)).ok_or_else(|| WorkflowError::PreconditionNotMet {
                    action: "create".to_string(),
                    reason: "task descriptions must not be empty".to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let instance_id = Uuid::new_v4().to_string();
        let genesis = Genesis {
            parties,
            tasks,
            created_at: self.clock.now(),
        };
        let opening = AuditDraft {
            actor_id: genesis.parties.initiator_id.clone(),
            action: AuditAction::Create {
                genesis: genesis.clone(),
            },
            old_state: WorkflowState::Created,
            new_state: WorkflowState::Created,
            comment: None,
            timestamp: genesis.created_at,
            is_override: false,
        }
        .to_record()?;
        let instance = WorkflowInstance::new(instance_id.clone(), genesis);
        let write = encode(&instance)?;

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = match self
            .storage
            .insert_instance(&mut snapshot, &instance_id, write)
            .await
        {
            Ok(()) => {
                self.storage
                    .append_audit(&mut snapshot, &instance_id, opening)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            self.abort(snapshot).await;
            return Err(e.into());
        }
        self.storage.commit_snapshot(snapshot).await?;

        info!(
            instance_id = %instance_id,
            tasks = instance.tasks.len(),
            "workflow instance created"
        );
        self.sink.notify(&WorkflowEvent::Created {
            instance_id: instance_id.clone(),
            initiator_id: instance.parties.initiator_id.clone(),
        });
        Ok(instance_id)
    }

    #[instrument(
        skip(self, request),
        fields(
            instance_id = %request.instance_id,
            actor_id = %request.actor_id,
            action = %request.action,
        )
    )]
    pub async fn apply_action(&self, request: ActionRequest) -> Result<ActionOutcome, WorkflowError> {
        let claims = self.directory.claims(&request.actor_id).await?;
        let committed = self
            .mutate(&request.instance_id, request.expected_version, |instance, now| {
                let roles = RoleResolver::roles_for(&claims, instance);
                let decision = TransitionGuard::check(
                    instance,
                    request.action,
                    &roles,
                    request.comment.as_deref(),
                )
                .map_err(|denial| {
                    let err = denial.into_error(&request.actor_id, request.action);
                    deny(&request.instance_id, &request.actor_id, &roles, &err);
                    err
                })?;
                instance.apply_transition(decision.action, decision.to, decision.comment.clone(), now);
                info!(
                    from = %decision.from,
                    to = %decision.to,
                    is_override = decision.is_override,
                    "transition applied"
                );
                Ok(Change {
                    audit: AuditDraft {
                        actor_id: request.actor_id.clone(),
                        action: AuditAction::Transition {
                            action: decision.action,
                        },
                        old_state: decision.from,
                        new_state: decision.to,
                        comment: decision.comment,
                        timestamp: now,
                        is_override: decision.is_override,
                    },
                    event: WorkflowEvent::Transitioned {
                        instance_id: request.instance_id.clone(),
                        actor_id: request.actor_id.clone(),
                        action: decision.action,
                        from: decision.from,
                        to: decision.to,
                        is_override: decision.is_override,
                    },
                    output: (),
                })
            })
            .await?;
        Ok(self.audited_outcome(committed))
    }

    #[instrument(skip(self, comment))]
    pub async fn update_task_status(
        &self,
        instance_id: &str,
        task_id: TaskId,
        actor_id: &str,
        new_status: TaskStatus,
        comment: Option<&str>,
    ) -> Result<TaskUpdate, WorkflowError> {
        let claims = self.directory.claims(actor_id).await?;
        let committed = self
            .mutate(instance_id, None, |instance, now| {
                let roles = RoleResolver::roles_for(&claims, instance);
                let change = TaskChange {
                    task_id,
                    new_status,
                    comment,
                    at: now,
                };
                let activity = instance
                    .tasks
                    .update_status(instance.state, actor_id, &roles, change)
                    .inspect_err(|err| deny(instance_id, actor_id, &roles, err))?;
                instance.touch(now);
                let task = instance
                    .tasks
                    .get(task_id)
                    .cloned()
                    .ok_or_else(|| WorkflowError::NotFound {
                        kind: "task",
                        id: task_id.to_string(),
                    })?;
                info!(
                    task_id,
                    old_status = %activity.old_status,
                    new_status = %activity.new_status,
                    is_override = activity.is_override,
                    "task status updated"
                );
                Ok(Change {
                    audit: AuditDraft {
                        actor_id: actor_id.to_string(),
                        action: AuditAction::TaskStatus {
                            task_id,
                            old_status: activity.old_status,
                            new_status: activity.new_status,
                        },
                        old_state: instance.state,
                        new_state: instance.state,
                        comment: activity.comment.clone(),
                        timestamp: now,
                        is_override: activity.is_override,
                    },
                    event: WorkflowEvent::TaskUpdated {
                        instance_id: instance_id.to_string(),
                        actor_id: actor_id.to_string(),
                        task_id,
                        old_status: activity.old_status,
                        new_status: activity.new_status,
                        is_override: activity.is_override,
                    },
                    output: (task, activity),
                })
            })
            .await?;
        let (task, activity) = committed.output;
        Ok(TaskUpdate {
            snapshot: self.snapshot_of(&committed.instance, committed.version),
            task,
            activity,
        })
    }

    /// Replace the supervisor before they have approved. Administrator only,
    /// always audited as an override.
    #[instrument(skip(self, comment))]
    pub async fn reassign_supervisor(
        &self,
        instance_id: &str,
        actor_id: &str,
        new_supervisor_id: &str,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, WorkflowError> {
        const ACTION: &str = "reassign_supervisor";
        let claims = self.directory.claims(actor_id).await?;
        let committed = self
            .mutate(instance_id, None, |instance, now| {
                let roles = RoleResolver::roles_for(&claims, instance);
                let checked = ensure_live(instance)
                    .and_then(|_| authorize(&roles, &[Role::Administrator], actor_id, ACTION))
                    .and_then(|_| {
                        if instance.stamps.supervisor_approved_at.is_some() {
                            return Err(precondition(ACTION, "the supervisor has already approved"));
                        }
                        let replacement = new_supervisor_id.trim();
                        if replacement.is_empty() {
                            return Err(precondition(ACTION, "new supervisor id must not be empty"));
                        }
                        if replacement == instance.parties.supervisor_id {
                            return Err(precondition(
                                ACTION,
                                &format!("{} is already the supervisor", replacement),
                            ));
                        }
                        Ok(replacement.to_string())
                    });
                let replacement =
                    checked.inspect_err(|err| deny(instance_id, actor_id, &roles, err))?;

                let previous =
                    std::mem::replace(&mut instance.parties.supervisor_id, replacement.clone());
                instance.touch(now);
                info!(%previous, %replacement, "supervisor reassigned");
                Ok(Change {
                    audit: AuditDraft {
                        actor_id: actor_id.to_string(),
                        action: AuditAction::ReassignSupervisor {
                            previous: previous.clone(),
                            replacement: replacement.clone(),
                        },
                        old_state: instance.state,
                        new_state: instance.state,
                        comment: normalize_comment(comment),
                        timestamp: now,
                        is_override: true,
                    },
                    event: WorkflowEvent::SupervisorReassigned {
                        instance_id: instance_id.to_string(),
                        actor_id: actor_id.to_string(),
                        previous,
                        replacement,
                    },
                    output: (),
                })
            })
            .await?;
        Ok(self.audited_outcome(committed))
    }

    /// Add a task while the instance is still a draft.
    #[instrument(skip(self, description))]
    pub async fn add_task(
        &self,
        instance_id: &str,
        actor_id: &str,
        description: &str,
    ) -> Result<ActionOutcome, WorkflowError> {
        const ACTION: &str = "add_task";
        let claims = self.directory.claims(actor_id).await?;
        let committed = self
            .mutate(instance_id, None, |instance, now| {
                let roles = RoleResolver::roles_for(&claims, instance);
                let checked = ensure_live(instance)
                    .and_then(|_| authorize(&roles, &[Role::Initiator], actor_id, ACTION))
                    .and_then(|is_override| {
                        if instance.state != WorkflowState::Created {
                            return Err(precondition(
                                ACTION,
                                &format!("tasks can only be added while CREATED, not {}", instance.state),
                            ));
                        }
                        let description = normalize_comment(Some(description))
                            .ok_or_else(|| precondition(ACTION, "description must not be empty"))?;
                        Ok((is_override, description))
                    });
                let (is_override, description) =
                    checked.inspect_err(|err| deny(instance_id, actor_id, &roles, err))?;

                let task_id = instance.tasks.add(description.clone());
                instance.touch(now);
                info!(task_id, "task added");
                Ok(Change {
                    audit: AuditDraft {
                        actor_id: actor_id.to_string(),
                        action: AuditAction::AddTask {
                            task_id,
                            description,
                        },
                        old_state: instance.state,
                        new_state: instance.state,
                        comment: None,
                        timestamp: now,
                        is_override,
                    },
                    event: WorkflowEvent::TaskAdded {
                        instance_id: instance_id.to_string(),
                        actor_id: actor_id.to_string(),
                        task_id,
                    },
                    output: (),
                })
            })
            .await?;
        Ok(self.audited_outcome(committed))
    }

    /// Remove a task nobody has updated yet. Logged tasks must be canceled
    /// instead.
    #[instrument(skip(self))]
    pub async fn remove_task(
        &self,
        instance_id: &str,
        task_id: TaskId,
        actor_id: &str,
    ) -> Result<ActionOutcome, WorkflowError> {
        const ACTION: &str = "remove_task";
        let claims = self.directory.claims(actor_id).await?;
        let committed = self
            .mutate(instance_id, None, |instance, now| {
                let roles = RoleResolver::roles_for(&claims, instance);
                let is_override = ensure_live(instance)
                    .and_then(|_| authorize(&roles, &[Role::Initiator], actor_id, ACTION))
                    .and_then(|is_override| instance.tasks.remove(task_id).map(|_| is_override))
                    .inspect_err(|err| deny(instance_id, actor_id, &roles, err))?;
                instance.touch(now);
                info!(task_id, "task removed");
                Ok(Change {
                    audit: AuditDraft {
                        actor_id: actor_id.to_string(),
                        action: AuditAction::RemoveTask { task_id },
                        old_state: instance.state,
                        new_state: instance.state,
                        comment: None,
                        timestamp: now,
                        is_override,
                    },
                    event: WorkflowEvent::TaskRemoved {
                        instance_id: instance_id.to_string(),
                        actor_id: actor_id.to_string(),
                        task_id,
                    },
                    output: (),
                })
            })
            .await?;
        Ok(self.audited_outcome(committed))
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub async fn get_snapshot(&self, instance_id: &str) -> Result<InstanceSnapshot, WorkflowError> {
        let record = self.storage.get_instance(instance_id).await?;
        let instance = decode(&record)?;
        Ok(self.snapshot_of(&instance, record.version))
    }

    /// The workflow-level history. Task updates appear in each task's
    /// activity log instead.
    pub async fn get_audit_log(&self, instance_id: &str) -> Result<Vec<AuditEntry>, WorkflowError> {
        let records = self.storage.list_audit(instance_id).await?;
        Ok(AuditLog::from_records(&records)?
            .into_entries()
            .into_iter()
            .filter(|entry| entry.action.is_workflow_level())
            .collect())
    }

    pub async fn list_instances(
        &self,
        state_filter: Option<WorkflowState>,
    ) -> Result<Vec<InstanceSnapshot>, WorkflowError> {
        let records = self
            .storage
            .list_instances(state_filter.map(WorkflowState::as_str))
            .await?;
        records
            .iter()
            .map(|record| Ok(self.snapshot_of(&decode(record)?, record.version)))
            .collect()
    }

    /// Replay the audit chain from its `create` entry and check that it
    /// reproduces the stored document, task activity included.
    #[instrument(skip(self))]
    pub async fn verify_history(&self, instance_id: &str) -> Result<VerifiedHistory, WorkflowError> {
        let _guard = self.locks.acquire(instance_id).await;
        let record = self.storage.get_instance(instance_id).await?;
        let stored = decode(&record)?;
        let log = AuditLog::from_records(&self.storage.list_audit(instance_id).await?)?;

        let replayed = WorkflowInstance::replay(instance_id, log.entries())?;
        if replayed != stored {
            warn!(instance_id, "stored instance disagrees with its history");
            return Err(WorkflowError::Corrupt {
                message: format!(
                    "instance {} does not match its replayed audit log ({} stored, {} replayed)",
                    instance_id, stored.state, replayed.state
                ),
            });
        }
        if !stored.stamps.is_ordered() {
            return Err(WorkflowError::Corrupt {
                message: format!("instance {} has out-of-order signing stamps", instance_id),
            });
        }
        let entries = log.workflow_entries().count();
        let task_activities = log
            .entries()
            .iter()
            .filter(|e| matches!(e.action, AuditAction::TaskStatus { .. }))
            .count();
        debug!(entries, task_activities, "history verified");
        Ok(VerifiedHistory {
            instance_id: instance_id.to_string(),
            version: record.version,
            entries,
            task_activities,
            head_digest: log.last().map(|e| e.digest.clone()),
        })
    }

    /// Roles `actor_id` would hold on `instance_id` right now.
    pub async fn roles_of(&self, instance_id: &str, actor_id: &str) -> Result<RoleSet, WorkflowError> {
        let claims: ActorClaims = self.directory.claims(actor_id).await?;
        let record = self.storage.get_instance(instance_id).await?;
        Ok(RoleResolver::roles_for(&claims, &decode(&record)?))
    }

    /// Actions `actor_id` could currently perform on `instance_id`.
    pub async fn allowed_actions(
        &self,
        instance_id: &str,
        actor_id: &str,
    ) -> Result<Vec<Action>, WorkflowError> {
        let claims = self.directory.claims(actor_id).await?;
        let record = self.storage.get_instance(instance_id).await?;
        let instance = decode(&record)?;
        let roles = RoleResolver::roles_for(&claims, &instance);
        Ok(TransitionGuard::allowed_actions(&instance, &roles))
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Run `apply` against a copy of the instance and commit the result
    /// together with its audit entry.
    async fn mutate<T, F>(
        &self,
        instance_id: &str,
        expected_version: Option<i64>,
        apply: F,
    ) -> Result<Committed<T>, WorkflowError>
    where
        T: Send,
        F: FnOnce(&mut WorkflowInstance, OffsetDateTime) -> Result<Change<T>, WorkflowError> + Send,
    {
        let _guard = self.locks.acquire(instance_id).await;
        debug!(instance_id, "instance lock acquired");

        let mut snapshot = self.storage.begin_snapshot().await?;
        let staged = match self
            .stage(&mut snapshot, instance_id, expected_version, apply)
            .await
        {
            Ok(staged) => staged,
            Err(e) => {
                self.abort(snapshot).await;
                return Err(e);
            }
        };
        self.storage.commit_snapshot(snapshot).await?;
        debug!(instance_id, version = staged.0.version, "snapshot committed");

        let (committed, event) = staged;
        self.sink.notify(&event);
        Ok(committed)
    }

    async fn stage<T, F>(
        &self,
        snapshot: &mut S::Snapshot,
        instance_id: &str,
        expected_version: Option<i64>,
        apply: F,
    ) -> Result<(Committed<T>, WorkflowEvent), WorkflowError>
    where
        T: Send,
        F: FnOnce(&mut WorkflowInstance, OffsetDateTime) -> Result<Change<T>, WorkflowError> + Send,
    {
        let record = self
            .storage
            .get_instance_for_update(snapshot, instance_id)
            .await?;
        if let Some(expected) = expected_version {
            if expected != record.version {
                warn!(
                    instance_id,
                    expected,
                    found = record.version,
                    "stale expected version"
                );
                return Err(WorkflowError::ConcurrentModification {
                    instance_id: instance_id.to_string(),
                    expected_version: expected,
                });
            }
        }

        let mut instance = decode(&record)?;
        // Never let a clock stepping backwards reorder stamps or the log.
        let now = self.clock.now().max(instance.last_activity_at);
        let change = apply(&mut instance, now)?;

        let version = self
            .storage
            .update_instance(snapshot, instance_id, record.version, encode(&instance)?)
            .await?;
        let appended = self
            .storage
            .append_audit(snapshot, instance_id, change.audit.to_record()?)
            .await?;
        let audit = AuditEntry::from_record(&appended)?;
        Ok((
            Committed {
                instance,
                version,
                audit,
                output: change.output,
            },
            change.event,
        ))
    }

    async fn abort(&self, snapshot: S::Snapshot) {
        if let Err(e) = self.storage.abort_snapshot(snapshot).await {
            warn!(error = %e, "failed to abort storage snapshot");
        }
    }

    fn audited_outcome(&self, committed: Committed<()>) -> ActionOutcome {
        ActionOutcome {
            snapshot: self.snapshot_of(&committed.instance, committed.version),
            audit_entry: committed.audit,
        }
    }

    fn snapshot_of(&self, instance: &WorkflowInstance, version: i64) -> InstanceSnapshot {
        let now = self.clock.now().max(instance.last_activity_at);
        InstanceSnapshot::new(instance, version, now, &self.policy)
    }
}

fn decode(record: &InstanceRecord) -> Result<WorkflowInstance, WorkflowError> {
    let instance: WorkflowInstance =
        serde_json::from_value(record.document.clone()).map_err(|e| WorkflowError::Corrupt {
            message: format!("instance {} is unreadable: {}", record.instance_id, e),
        })?;
    if instance.id != record.instance_id || instance.state.as_str() != record.state {
        return Err(WorkflowError::Corrupt {
            message: format!(
                "instance {} document disagrees with its record ({} / {})",
                record.instance_id, instance.state, record.state
            ),
        });
    }
    Ok(instance)
}

fn encode(instance: &WorkflowInstance) -> Result<InstanceWrite, WorkflowError> {
    Ok(InstanceWrite {
        state: instance.state.as_str().to_string(),
        updated_at: format_timestamp(instance.last_activity_at)?,
        document: serde_json::to_value(instance).map_err(|e| WorkflowError::Corrupt {
            message: format!("cannot encode instance {}: {}", instance.id, e),
        })?,
    })
}

fn ensure_live(instance: &WorkflowInstance) -> Result<(), WorkflowError> {
    if instance.state.is_terminal() {
        return Err(WorkflowError::AlreadyTerminal {
            state: instance.state,
        });
    }
    Ok(())
}

/// Returns whether the actor acts as an administrator override.
fn authorize(
    roles: &RoleSet,
    required: &[Role],
    actor_id: &str,
    action: &str,
) -> Result<bool, WorkflowError> {
    if roles.contains_any(required) {
        Ok(false)
    } else if roles.is_administrator() {
        Ok(true)
    } else {
        Err(WorkflowError::WrongRole {
            actor_id: actor_id.to_string(),
            action: action.to_string(),
            required: required
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(" or "),
        })
    }
}

fn precondition(action: &str, reason: &str) -> WorkflowError {
    WorkflowError::PreconditionNotMet {
        action: action.to_string(),
        reason: reason.to_string(),
    }
}

fn deny(instance_id: &str, actor_id: &str, roles: &RoleSet, err: &WorkflowError) {
    warn!(
        instance_id,
        actor_id,
        roles = %roles,
        kind = err.kind(),
        "request denied: {}",
        err
    );
}
