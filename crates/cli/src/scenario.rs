//! Scripted scenario files for `signoff run`.
//!
//! ```json
//! {
//!   "parties": { "initiator_id": "E1", "counterparty_id": "E2", "supervisor_id": "M1" },
//!   "tasks": ["Return badge"],
//!   "steps": [
//!     { "op": "action", "actor": "E1", "action": "sign_initiator" },
//!     { "op": "action", "actor": "E2", "action": "sign_initiator", "expect": "wrong_role" },
//!     { "op": "task", "actor": "E2", "task_id": 1, "status": "COMPLETED" },
//!     { "op": "wait", "days": 3 }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use signoff_engine::{Action, Parties, TaskId, TaskStatus, WorkflowError};
use time::OffsetDateTime;

/// Longest single `wait` step, roughly a century.
const MAX_WAIT_DAYS: i64 = 36_500;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub parties: Parties,
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Starting time of the scenario clock. Defaults to now.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start: Option<OffsetDateTime>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Step {
    #[serde(flatten)]
    pub op: StepOp,
    /// `"ok"` or an error kind such as `"wrong_role"`.
    #[serde(default)]
    pub expect: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum StepOp {
    Action {
        actor: String,
        action: Action,
        #[serde(default)]
        comment: Option<String>,
    },
    Task {
        actor: String,
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default)]
        comment: Option<String>,
    },
    Reassign {
        actor: String,
        supervisor: String,
        #[serde(default)]
        comment: Option<String>,
    },
    AddTask {
        actor: String,
        description: String,
    },
    RemoveTask {
        actor: String,
        task_id: TaskId,
    },
    Wait {
        days: i64,
    },
}

impl StepOp {
    pub fn describe(&self) -> String {
        match self {
            StepOp::Action { actor, action, .. } => format!("{} by {}", action, actor),
            StepOp::Task {
                actor,
                task_id,
                status,
                ..
            } => format!("task {} -> {} by {}", task_id, status, actor),
            StepOp::Reassign {
                actor, supervisor, ..
            } => format!("reassign supervisor to {} by {}", supervisor, actor),
            StepOp::AddTask { actor, description } => {
                format!("add task '{}' by {}", description, actor)
            }
            StepOp::RemoveTask { actor, task_id } => {
                format!("remove task {} by {}", task_id, actor)
            }
            StepOp::Wait { days } => format!("wait {} day(s)", days),
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
        let scenario: Scenario = serde_json::from_str(&content)
            .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), String> {
        for (i, step) in self.steps.iter().enumerate() {
            if let Some(expect) = &step.expect {
                if expect != "ok" && !WorkflowError::KINDS.contains(&expect.as_str()) {
                    return Err(format!(
                        "step {}: unknown expectation '{}' (use \"ok\" or one of: {})",
                        i + 1,
                        expect,
                        WorkflowError::KINDS.join(", ")
                    ));
                }
            }
            if let StepOp::Wait { days } = step.op {
                if days < 0 {
                    return Err(format!("step {}: cannot wait a negative number of days", i + 1));
                }
                if days > MAX_WAIT_DAYS {
                    return Err(format!(
                        "step {}: cannot wait more than {} days, got {}",
                        i + 1,
                        MAX_WAIT_DAYS,
                        days
                    ));
                }
            }
        }
        Ok(())
    }
}
