//! Human-facing aggregate status.
//!
//! [`project`] is a pure function of the instance, the current time and the
//! policy. It never reads the audit log.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::instance::WorkflowInstance;
use crate::state::WorkflowState;
use crate::task::TaskProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionPolicy {
    /// Whole days without activity after which a live instance is overdue.
    pub overdue_after_days: u32,
}

impl Default for ProjectionPolicy {
    fn default() -> Self {
        Self {
            overdue_after_days: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Draft,
    AwaitingCounterparty,
    AwaitingSupervisor,
    NeedsClarification,
    Approved,
    InHandover,
    Completed,
    Rejected,
}

impl Badge {
    pub fn for_state(state: WorkflowState) -> Self {
        match state {
            WorkflowState::Created => Badge::Draft,
            WorkflowState::SignedByInitiator => Badge::AwaitingCounterparty,
            WorkflowState::SignedByCounterparty | WorkflowState::Resubmitted => {
                Badge::AwaitingSupervisor
            }
            WorkflowState::NeedClarification => Badge::NeedsClarification,
            WorkflowState::ApprovedBySupervisor => Badge::Approved,
            WorkflowState::TakenOver => Badge::InHandover,
            WorkflowState::TakenBack => Badge::Completed,
            WorkflowState::Rejected => Badge::Rejected,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Badge::Draft => "Draft",
            Badge::AwaitingCounterparty => "Awaiting counterparty",
            Badge::AwaitingSupervisor => "Awaiting supervisor",
            Badge::NeedsClarification => "Needs clarification",
            Badge::Approved => "Approved",
            Badge::InHandover => "In handover",
            Badge::Completed => "Completed",
            Badge::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedStatus {
    pub badge: Badge,
    pub label: String,
    /// What has to happen next, prefixed when the instance is overdue.
    pub hint: String,
    /// Days since last activity, set only once the overdue threshold is reached.
    pub overdue_days: Option<i64>,
    pub progress: TaskProgress,
    pub all_tasks_settled: bool,
}

pub fn project(
    instance: &WorkflowInstance,
    now: OffsetDateTime,
    policy: &ProjectionPolicy,
) -> ProjectedStatus {
    let badge = Badge::for_state(instance.state);
    let progress = instance.tasks.progress();
    let next = next_step(instance, &progress);

    let idle_days = (now - instance.last_activity_at).whole_days();
    let overdue_days = (!instance.state.is_terminal()
        && idle_days >= i64::from(policy.overdue_after_days))
    .then_some(idle_days);
    let hint = match overdue_days {
        Some(days) => format!("overdue: no action since {} days; {}", days, next),
        None => next,
    };

    ProjectedStatus {
        badge,
        label: badge.label().to_string(),
        hint,
        overdue_days,
        all_tasks_settled: progress.all_settled(),
        progress,
    }
}

fn next_step(instance: &WorkflowInstance, progress: &TaskProgress) -> String {
    match instance.state {
        WorkflowState::Created => "waiting on initiator signature".to_string(),
        WorkflowState::SignedByInitiator => "waiting on counterparty signature".to_string(),
        WorkflowState::SignedByCounterparty => "waiting on supervisor decision".to_string(),
        WorkflowState::Resubmitted => {
            "waiting on supervisor decision after resubmission".to_string()
        }
        WorkflowState::NeedClarification => match &instance.clarification_comment {
            Some(question) => format!("waiting on initiator to answer: {}", question),
            None => "waiting on initiator to answer clarification".to_string(),
        },
        WorkflowState::ApprovedBySupervisor => "waiting on take-over".to_string(),
        WorkflowState::TakenOver if progress.all_settled() => {
            "all tasks settled; waiting on take-back".to_string()
        }
        WorkflowState::TakenOver => format!(
            "handover in progress: {} of {} tasks settled",
            progress.settled, progress.total
        ),
        WorkflowState::TakenBack => "no further action".to_string(),
        WorkflowState::Rejected => match &instance.rejection_reason {
            Some(reason) => format!("rejected: {}", reason),
            None => "rejected".to_string(),
        },
    }
}
