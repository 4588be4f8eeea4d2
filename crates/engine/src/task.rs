//! Sub-item (task / objective) tracking.
//!
//! Tasks live in an id-indexed arena owned by their instance. Their status is
//! independent of the workflow state and of each other; every status update
//! is recorded in the task's own activity log, including updates that leave
//! the status unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::WorkflowError;
use crate::role::{Role, RoleSet};
use crate::state::WorkflowState;

pub type TaskId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Canceled,
    Postponed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::NotStarted,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Canceled,
        TaskStatus::Postponed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Canceled => "CANCELED",
            TaskStatus::Postponed => "POSTPONED",
        }
    }

    /// Completed and canceled tasks need no further work.
    pub fn is_settled(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Canceled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task status '{}'", s))
    }
}

/// One entry of a task's activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskActivity {
    pub actor_id: String,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "override")]
    pub is_override: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub description: String,
    pub current_status: TaskStatus,
    pub activity_log: Vec<TaskActivity>,
}

impl TaskRecord {
    fn new(id: TaskId, description: String) -> Self {
        Self {
            id,
            description,
            current_status: TaskStatus::NotStarted,
            activity_log: Vec::new(),
        }
    }

    pub fn last_activity_at(&self) -> Option<OffsetDateTime> {
        self.activity_log.last().map(|a| a.timestamp)
    }
}

/// Settled-versus-total counts for the aggregate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub settled: usize,
    pub total: usize,
}

impl TaskProgress {
    /// True when every task is completed or canceled (vacuously for none).
    pub fn all_settled(&self) -> bool {
        self.settled == self.total
    }
}

/// A requested status change for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskChange<'a> {
    pub task_id: TaskId,
    pub new_status: TaskStatus,
    pub comment: Option<&'a str>,
    pub at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTracker {
    next_id: TaskId,
    tasks: BTreeMap<TaskId, TaskRecord>,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self {
            next_id: 1,
            tasks: BTreeMap::new(),
        }
    }
}

impl TaskTracker {
    pub fn new<I>(descriptions: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut tracker = Self::default();
        for description in descriptions {
            tracker.add(description);
        }
        tracker
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn progress(&self) -> TaskProgress {
        TaskProgress {
            settled: self
                .tasks
                .values()
                .filter(|t| t.current_status.is_settled())
                .count(),
            total: self.tasks.len(),
        }
    }

    /// Latest activity timestamp across all tasks.
    pub fn last_activity_at(&self) -> Option<OffsetDateTime> {
        self.tasks.values().filter_map(TaskRecord::last_activity_at).max()
    }

    /// Ids are never reused, even after removal.
    pub(crate) fn add(&mut self, description: String) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(id, TaskRecord::new(id, description));
        id
    }

    /// Remove a task that has never been updated.
    pub(crate) fn remove(&mut self, id: TaskId) -> Result<TaskRecord, WorkflowError> {
        let task = self.tasks.get(&id).ok_or_else(|| WorkflowError::NotFound {
            kind: "task",
            id: id.to_string(),
        })?;
        if !task.activity_log.is_empty() {
            return Err(WorkflowError::PreconditionNotMet {
                action: "remove_task".to_string(),
                reason: format!(
                    "task {} has {} logged update(s); cancel it instead",
                    id,
                    task.activity_log.len()
                ),
            });
        }
        self.tasks.remove(&id).ok_or_else(|| WorkflowError::NotFound {
            kind: "task",
            id: id.to_string(),
        })
    }

    /// Record a status update for one task.
    ///
    /// The counterparty updates tasks; an administrator may do so as an
    /// override. Nothing may change once the parent instance is rejected.
    pub(crate) fn update_status(
        &mut self,
        parent_state: WorkflowState,
        actor_id: &str,
        roles: &RoleSet,
        change: TaskChange<'_>,
    ) -> Result<TaskActivity, WorkflowError> {
        if parent_state == WorkflowState::Rejected {
            return Err(WorkflowError::AlreadyTerminal {
                state: parent_state,
            });
        }
        let is_override = if roles.contains(Role::Counterparty) {
            false
        } else if roles.is_administrator() {
            true
        } else {
            return Err(WorkflowError::WrongRole {
                actor_id: actor_id.to_string(),
                action: "update_task_status".to_string(),
                required: Role::Counterparty.to_string(),
            });
        };
        let old_status = self
            .get(change.task_id)
            .map(|task| task.current_status)
            .ok_or_else(|| WorkflowError::NotFound {
                kind: "task",
                id: change.task_id.to_string(),
            })?;

        let activity = TaskActivity {
            actor_id: actor_id.to_string(),
            old_status,
            new_status: change.new_status,
            comment: normalize_comment(change.comment),
            timestamp: change.at,
            is_override,
        };
        self.record(change.task_id, activity.clone())?;
        Ok(activity)
    }

    /// Append an activity whose authorization is already settled. Replay
    /// feeds audited task entries through here.
    pub(crate) fn record(&mut self, id: TaskId, activity: TaskActivity) -> Result<(), WorkflowError> {
        let task = self.tasks.get_mut(&id).ok_or_else(|| WorkflowError::NotFound {
            kind: "task",
            id: id.to_string(),
        })?;
        if activity.old_status != task.current_status {
            return Err(WorkflowError::Corrupt {
                message: format!(
                    "task {} activity starts from {} but task was {}",
                    id, activity.old_status, task.current_status
                ),
            });
        }
        task.current_status = activity.new_status;
        task.activity_log.push(activity);
        Ok(())
    }
}

/// Trim a comment; blank comments are treated as absent.
pub(crate) fn normalize_comment(comment: Option<&str>) -> Option<String> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}
