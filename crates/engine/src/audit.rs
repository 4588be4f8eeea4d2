//! The per-instance audit trail.
//!
//! Entries are drafted by the engine, appended by the storage backend (which
//! assigns the sequence number and chains the digest), and read back as an
//! [`AuditLog`] that re-verifies ordering and the digest chain.
//!
//! One chain holds everything replay needs: the `create` entry that opens
//! it, workflow-level changes, and every task status update. Only the
//! workflow-level entries make up the instance history shown to callers;
//! task activity surfaces through each task's own log.

use std::fmt;

use serde::{Deserialize, Serialize};
use signoff_storage::{chain_digest, AuditRecord, NewAuditRecord};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::WorkflowError;
use crate::instance::Genesis;
use crate::state::{Action, WorkflowState};
use crate::task::{TaskId, TaskStatus};

/// What an audit entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditAction {
    /// Always the first entry of a log.
    Create { genesis: Genesis },
    Transition { action: Action },
    ReassignSupervisor { previous: String, replacement: String },
    AddTask { task_id: TaskId, description: String },
    RemoveTask { task_id: TaskId },
    TaskStatus {
        task_id: TaskId,
        old_status: TaskStatus,
        new_status: TaskStatus,
    },
}

impl AuditAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuditAction::Create { .. } => "create",
            AuditAction::Transition { action } => action.as_str(),
            AuditAction::ReassignSupervisor { .. } => "reassign_supervisor",
            AuditAction::AddTask { .. } => "add_task",
            AuditAction::RemoveTask { .. } => "remove_task",
            AuditAction::TaskStatus { .. } => "task_status",
        }
    }

    /// Whether the entry belongs to the instance history returned by
    /// `get_audit_log`.
    pub fn is_workflow_level(&self) -> bool {
        !matches!(
            self,
            AuditAction::Create { .. } | AuditAction::TaskStatus { .. }
        )
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An entry before the backend has sequenced it. Serialized as the record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AuditDraft {
    pub actor_id: String,
    pub action: AuditAction,
    pub old_state: WorkflowState,
    pub new_state: WorkflowState,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "override")]
    pub is_override: bool,
}

impl AuditDraft {
    pub(crate) fn to_record(&self) -> Result<NewAuditRecord, WorkflowError> {
        Ok(NewAuditRecord {
            action: self.action.name().to_string(),
            actor_id: self.actor_id.clone(),
            recorded_at: format_timestamp(self.timestamp)?,
            payload: serde_json::to_value(self).map_err(|e| WorkflowError::Corrupt {
                message: format!("cannot encode audit entry: {}", e),
            })?,
        })
    }
}

/// One immutable entry of an instance's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 1-based position in the instance's chain, which also counts the
    /// creation entry and task updates.
    pub sequence: u64,
    pub actor_id: String,
    pub action: AuditAction,
    pub old_state: WorkflowState,
    pub new_state: WorkflowState,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "override")]
    pub is_override: bool,
    pub digest: String,
}

impl AuditEntry {
    pub fn from_record(record: &AuditRecord) -> Result<Self, WorkflowError> {
        let draft: AuditDraft =
            serde_json::from_value(record.payload.clone()).map_err(|e| WorkflowError::Corrupt {
                message: format!("audit entry {} is unreadable: {}", record.sequence, e),
            })?;
        if draft.action.name() != record.action || draft.actor_id != record.actor_id {
            return Err(WorkflowError::Corrupt {
                message: format!(
                    "audit entry {} header ({} by {}) disagrees with its payload",
                    record.sequence, record.action, record.actor_id
                ),
            });
        }
        let sequence = u64::try_from(record.sequence).map_err(|_| WorkflowError::Corrupt {
            message: format!("negative audit sequence {}", record.sequence),
        })?;
        Ok(AuditEntry {
            sequence,
            actor_id: draft.actor_id,
            action: draft.action,
            old_state: draft.old_state,
            new_state: draft.new_state,
            comment: draft.comment,
            timestamp: draft.timestamp,
            is_override: draft.is_override,
            digest: record.digest.clone(),
        })
    }
}

/// A verified, ordered audit trail for one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    /// Decode stored records, checking that sequences are contiguous from 1,
    /// timestamps never go backwards, and every digest chains to its
    /// predecessor.
    pub fn from_records(records: &[AuditRecord]) -> Result<Self, WorkflowError> {
        let mut log = AuditLog::default();
        let mut previous_digest: Option<&str> = None;
        for record in records {
            let expected = chain_digest(
                previous_digest,
                &record.instance_id,
                record.sequence,
                &record.action,
                &record.actor_id,
                &record.recorded_at,
                &record.payload,
            );
            if expected != record.digest {
                return Err(WorkflowError::Corrupt {
                    message: format!(
                        "audit entry {} of {} fails digest verification",
                        record.sequence, record.instance_id
                    ),
                });
            }
            log.push(AuditEntry::from_record(record)?)?;
            previous_digest = Some(&record.digest);
        }
        Ok(log)
    }

    fn push(&mut self, entry: AuditEntry) -> Result<(), WorkflowError> {
        let expected = self.entries.len() as u64 + 1;
        if entry.sequence != expected {
            return Err(WorkflowError::Corrupt {
                message: format!(
                    "audit sequence gap: expected {}, found {}",
                    expected, entry.sequence
                ),
            });
        }
        if let Some(last) = self.entries.last() {
            if entry.timestamp < last.timestamp {
                return Err(WorkflowError::Corrupt {
                    message: format!("audit entry {} predates its predecessor", entry.sequence),
                });
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    /// The entries callers see as the instance history.
    pub fn workflow_entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| e.action.is_workflow_level())
    }

    /// Entries performed by an administrator on another role's behalf.
    pub fn overrides(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| e.is_override)
    }
}

pub(crate) fn format_timestamp(at: OffsetDateTime) -> Result<String, WorkflowError> {
    at.format(&Rfc3339).map_err(|e| WorkflowError::Corrupt {
        message: format!("cannot format timestamp: {}", e),
    })
}
