//! The workflow instance document.
//!
//! A [`WorkflowInstance`] is a cache derived from its audit chain.
//! [`WorkflowInstance::replay`] rebuilds it from the chain alone, starting at
//! the [`Genesis`] carried by the `create` entry, and the engine stores
//! whatever replay would produce.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::audit::{AuditAction, AuditEntry};
use crate::error::WorkflowError;
use crate::state::{Action, WorkflowState};
use crate::task::{TaskActivity, TaskTracker};

/// The three actors bound to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parties {
    pub initiator_id: String,
    pub counterparty_id: String,
    pub supervisor_id: String,
}

impl Parties {
    pub fn new(initiator_id: &str, counterparty_id: &str, supervisor_id: &str) -> Self {
        Self {
            initiator_id: initiator_id.to_string(),
            counterparty_id: counterparty_id.to_string(),
            supervisor_id: supervisor_id.to_string(),
        }
    }
}

/// Everything an instance was created with. Recorded by the `create` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub parties: Parties,
    pub tasks: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Signing and handoff timestamps. Each is set at most once per round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamps {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub initiator_signed_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub counterparty_signed_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub supervisor_approved_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub taken_over_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub taken_back_at: Option<OffsetDateTime>,
}

impl Stamps {
    /// The stamp `action` sets, if it sets one.
    pub fn for_action(&self, action: Action) -> Option<Option<OffsetDateTime>> {
        match action {
            Action::SignInitiator => Some(self.initiator_signed_at),
            Action::SignCounterparty => Some(self.counterparty_signed_at),
            Action::Approve => Some(self.supervisor_approved_at),
            Action::TakeOver => Some(self.taken_over_at),
            Action::TakeBack => Some(self.taken_back_at),
            _ => None,
        }
    }

    /// True when no later stamp is set without every earlier one, and set
    /// stamps never go backwards in time.
    pub fn is_ordered(&self) -> bool {
        let chain = [
            self.initiator_signed_at,
            self.counterparty_signed_at,
            self.supervisor_approved_at,
            self.taken_over_at,
            self.taken_back_at,
        ];
        let mut previous: Option<OffsetDateTime> = None;
        let mut gap = false;
        for stamp in chain {
            match stamp {
                None => gap = true,
                Some(at) => {
                    if gap || previous.is_some_and(|p| at < p) {
                        return false;
                    }
                    previous = Some(at);
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub state: WorkflowState,
    pub parties: Parties,
    pub stamps: Stamps,
    pub rejection_reason: Option<String>,
    pub clarification_comment: Option<String>,
    pub tasks: TaskTracker,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last audited change to the instance or any of its tasks.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
}

impl WorkflowInstance {
    pub fn new(id: String, genesis: Genesis) -> Self {
        Self {
            id,
            state: WorkflowState::Created,
            parties: genesis.parties,
            stamps: Stamps::default(),
            rejection_reason: None,
            clarification_comment: None,
            tasks: TaskTracker::new(genesis.tasks),
            created_at: genesis.created_at,
            last_activity_at: genesis.created_at,
        }
    }

    /// Apply the field effects of a guarded transition. The caller has
    /// already checked that `action` is valid from the current state.
    pub(crate) fn apply_transition(
        &mut self,
        action: Action,
        to: WorkflowState,
        comment: Option<String>,
        at: OffsetDateTime,
    ) {
        match action {
            Action::SignInitiator => self.stamps.initiator_signed_at = Some(at),
            Action::SignCounterparty => self.stamps.counterparty_signed_at = Some(at),
            Action::Approve => {
                self.stamps.supervisor_approved_at = Some(at);
                self.clarification_comment = None;
            }
            Action::Reject => self.rejection_reason = comment,
            Action::RequestClarification => self.clarification_comment = comment,
            Action::Resubmit => self.clarification_comment = None,
            Action::TakeOver => self.stamps.taken_over_at = Some(at),
            Action::TakeBack => self.stamps.taken_back_at = Some(at),
            Action::Reopen => {
                self.stamps = Stamps::default();
                self.rejection_reason = None;
                self.clarification_comment = None;
            }
        }
        self.state = to;
        self.touch(at);
    }

    pub(crate) fn touch(&mut self, at: OffsetDateTime) {
        if at > self.last_activity_at {
            self.last_activity_at = at;
        }
    }

    /// Rebuild an instance from its full audit chain.
    ///
    /// The chain must open with a `create` entry. Every later entry must
    /// start from the state the previous one left, transitions must be ones
    /// the table defines, and task updates must continue each task's status.
    pub fn replay(id: &str, entries: &[AuditEntry]) -> Result<Self, WorkflowError> {
        let (first, rest) = entries.split_first().ok_or_else(|| WorkflowError::Corrupt {
            message: format!("instance {} has no creation entry", id),
        })?;
        let AuditAction::Create { genesis } = &first.action else {
            return Err(corrupt(first, "is not a creation entry".to_string()));
        };
        if genesis.created_at != first.timestamp {
            return Err(corrupt(first, "disagrees with its own creation time".to_string()));
        }
        let mut instance = WorkflowInstance::new(id.to_string(), genesis.clone());

        for entry in rest {
            if entry.old_state != instance.state {
                return Err(corrupt(entry, format!(
                    "starts from {} but instance was {}",
                    entry.old_state, instance.state
                )));
            }
            let changes_state = matches!(entry.action, AuditAction::Transition { .. });
            if !changes_state && entry.new_state != entry.old_state {
                return Err(corrupt(entry, format!(
                    "cannot move the instance to {}",
                    entry.new_state
                )));
            }
            match &entry.action {
                AuditAction::Create { .. } => {
                    return Err(corrupt(entry, "repeats instance creation".to_string()));
                }
                AuditAction::Transition { action } => {
                    if action.transition(entry.old_state) != Some(entry.new_state) {
                        return Err(corrupt(entry, format!(
                            "{} from {} cannot lead to {}",
                            action, entry.old_state, entry.new_state
                        )));
                    }
                    instance.apply_transition(
                        *action,
                        entry.new_state,
                        entry.comment.clone(),
                        entry.timestamp,
                    );
                }
                AuditAction::ReassignSupervisor {
                    previous,
                    replacement,
                } => {
                    if *previous != instance.parties.supervisor_id {
                        return Err(corrupt(entry, format!(
                            "reassigns {} but supervisor was {}",
                            previous, instance.parties.supervisor_id
                        )));
                    }
                    instance.parties.supervisor_id = replacement.clone();
                    instance.touch(entry.timestamp);
                }
                AuditAction::AddTask {
                    task_id,
                    description,
                } => {
                    let assigned = instance.tasks.add(description.clone());
                    if assigned != *task_id {
                        return Err(corrupt(entry, format!(
                            "adds task {} but the next id is {}",
                            task_id, assigned
                        )));
                    }
                    instance.touch(entry.timestamp);
                }
                AuditAction::RemoveTask { task_id } => {
                    instance.tasks.remove(*task_id)?;
                    instance.touch(entry.timestamp);
                }
                AuditAction::TaskStatus {
                    task_id,
                    old_status,
                    new_status,
                } => {
                    instance.tasks.record(
                        *task_id,
                        TaskActivity {
                            actor_id: entry.actor_id.clone(),
                            old_status: *old_status,
                            new_status: *new_status,
                            comment: entry.comment.clone(),
                            timestamp: entry.timestamp,
                            is_override: entry.is_override,
                        },
                    )?;
                    instance.touch(entry.timestamp);
                }
            }
        }
        Ok(instance)
    }
}

fn corrupt(entry: &AuditEntry, detail: String) -> WorkflowError {
    WorkflowError::Corrupt {
        message: format!("audit entry {} ({}) {}", entry.sequence, entry.action, detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use time::macros::datetime;
    use time::Duration;

    fn genesis() -> Genesis {
        Genesis {
            parties: Parties::new("E1", "E2", "M1"),
            tasks: vec!["Return badge".to_string()],
            created_at: datetime!(2025-01-01 9:00 UTC),
        }
    }

    fn created() -> AuditEntry {
        AuditEntry {
            timestamp: genesis().created_at,
            ..entry(
                1,
                AuditAction::Create { genesis: genesis() },
                WorkflowState::Created,
                WorkflowState::Created,
                None,
            )
        }
    }

    fn entry(
        sequence: u64,
        action: AuditAction,
        old_state: WorkflowState,
        new_state: WorkflowState,
        comment: Option<&str>,
    ) -> AuditEntry {
        AuditEntry {
            sequence,
            actor_id: "E1".to_string(),
            action,
            old_state,
            new_state,
            comment: comment.map(str::to_string),
            timestamp: datetime!(2025-01-01 9:00 UTC) + Duration::hours(sequence as i64),
            is_override: false,
            digest: String::new(),
        }
    }

    fn transition(action: Action) -> AuditAction {
        AuditAction::Transition { action }
    }

    #[test]
    fn new_instance_starts_created_with_genesis_tasks() {
        let inst = WorkflowInstance::new("inst-1".to_string(), genesis());
        assert_eq!(inst.state, WorkflowState::Created);
        assert_eq!(inst.tasks.len(), 1);
        assert_eq!(inst.last_activity_at, inst.created_at);
        assert!(inst.stamps.is_ordered());
    }

    #[test]
    fn replay_reproduces_fields() {
        use WorkflowState::*;
        let entries = vec![
            created(),
            entry(2, transition(Action::SignInitiator), Created, SignedByInitiator, None),
            entry(3, transition(Action::SignCounterparty), SignedByInitiator, SignedByCounterparty, None),
            entry(4, transition(Action::RequestClarification), SignedByCounterparty, NeedClarification, Some("need dates")),
        ];
        let inst = WorkflowInstance::replay("inst-1", &entries).unwrap();
        assert_eq!(inst.state, NeedClarification);
        assert_eq!(inst.clarification_comment.as_deref(), Some("need dates"));
        assert_eq!(inst.stamps.initiator_signed_at, Some(entries[1].timestamp));
        assert_eq!(inst.last_activity_at, entries[3].timestamp);
        assert!(inst.stamps.is_ordered());
    }

    #[test]
    fn replay_requires_creation_entry_first() {
        use WorkflowState::*;
        let entries = vec![entry(1, transition(Action::SignInitiator), Created, SignedByInitiator, None)];
        let err = WorkflowInstance::replay("inst-1", &entries).unwrap_err();
        assert!(matches!(err, WorkflowError::Corrupt { .. }));
        assert!(WorkflowInstance::replay("inst-1", &[]).is_err());
        assert!(WorkflowInstance::replay("inst-1", &[created(), created()]).is_err());
    }

    #[test]
    fn replay_rejects_out_of_table_transition() {
        use WorkflowState::*;
        let entries = vec![
            created(),
            entry(2, transition(Action::Approve), Created, ApprovedBySupervisor, None),
        ];
        let err = WorkflowInstance::replay("inst-1", &entries).unwrap_err();
        assert!(matches!(err, WorkflowError::Corrupt { .. }));
    }

    #[test]
    fn replay_rejects_state_discontinuity() {
        use WorkflowState::*;
        let entries = vec![
            created(),
            entry(2, transition(Action::SignCounterparty), SignedByInitiator, SignedByCounterparty, None),
        ];
        assert!(WorkflowInstance::replay("inst-1", &entries).is_err());
    }

    #[test]
    fn replay_applies_reassignment_and_task_changes() {
        use WorkflowState::*;
        let entries = vec![
            created(),
            entry(
                2,
                AuditAction::AddTask {
                    task_id: 2,
                    description: "Hand over keys".to_string(),
                },
                Created,
                Created,
                None,
            ),
            entry(3, AuditAction::RemoveTask { task_id: 1 }, Created, Created, None),
            entry(
                4,
                AuditAction::ReassignSupervisor {
                    previous: "M1".to_string(),
                    replacement: "M2".to_string(),
                },
                Created,
                Created,
                None,
            ),
        ];
        let inst = WorkflowInstance::replay("inst-1", &entries).unwrap();
        assert_eq!(inst.parties.supervisor_id, "M2");
        assert_eq!(inst.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn replay_rebuilds_task_activity_from_entries() {
        use WorkflowState::*;
        let update = |sequence, old_status, new_status| {
            entry(
                sequence,
                AuditAction::TaskStatus {
                    task_id: 1,
                    old_status,
                    new_status,
                },
                Created,
                Created,
                Some("at reception"),
            )
        };
        let entries = vec![
            created(),
            update(2, TaskStatus::NotStarted, TaskStatus::InProgress),
            update(3, TaskStatus::InProgress, TaskStatus::Completed),
        ];
        let inst = WorkflowInstance::replay("inst-1", &entries).unwrap();
        let task = inst.tasks.get(1).unwrap();
        assert_eq!(task.current_status, TaskStatus::Completed);
        assert_eq!(task.activity_log.len(), 2);
        assert_eq!(task.activity_log[0].actor_id, "E1");
        assert_eq!(inst.last_activity_at, entries[2].timestamp);
        assert_eq!(inst.state, Created);

        let skipped = vec![created(), update(2, TaskStatus::InProgress, TaskStatus::Completed)];
        assert!(WorkflowInstance::replay("inst-1", &skipped).is_err());
    }

    #[test]
    fn replay_rejects_state_change_outside_transitions() {
        use WorkflowState::*;
        let entries = vec![
            created(),
            entry(2, AuditAction::RemoveTask { task_id: 1 }, Created, SignedByInitiator, None),
        ];
        assert!(WorkflowInstance::replay("inst-1", &entries).is_err());
    }

    #[test]
    fn reopen_clears_round_fields() {
        let mut inst = WorkflowInstance::new("inst-1".to_string(), genesis());
        let at = datetime!(2025-01-02 9:00 UTC);
        inst.apply_transition(Action::SignInitiator, WorkflowState::SignedByInitiator, None, at);
        inst.state = WorkflowState::Rejected;
        inst.rejection_reason = Some("budget".to_string());
        inst.apply_transition(Action::Reopen, WorkflowState::Created, None, at);
        assert_eq!(inst.stamps, Stamps::default());
        assert_eq!(inst.rejection_reason, None);
        assert_eq!(inst.state, WorkflowState::Created);
    }

    #[test]
    fn stamp_gap_is_unordered() {
        let stamps = Stamps {
            counterparty_signed_at: Some(datetime!(2025-01-01 9:00 UTC)),
            ..Stamps::default()
        };
        assert!(!stamps.is_ordered());
    }
}
