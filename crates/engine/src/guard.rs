//! Transition authorization.
//!
//! Checks run in a fixed order: required comment, terminal state, role,
//! structural precondition. The first failing check decides the denial.

use crate::audit::format_timestamp;
use crate::error::WorkflowError;
use crate::instance::WorkflowInstance;
use crate::role::{Role, RoleSet};
use crate::state::{Action, WorkflowState};
use crate::task::normalize_comment;

/// A permitted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub from: WorkflowState,
    pub to: WorkflowState,
    /// The actor lacks the nominal role and acts as administrator.
    pub is_override: bool,
    /// Trimmed comment, present whenever the action requires one.
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    MissingComment,
    AlreadyTerminal { state: WorkflowState },
    WrongRole { required: &'static [Role] },
    PreconditionNotMet { reason: String },
}

impl Denial {
    pub fn into_error(self, actor_id: &str, action: Action) -> WorkflowError {
        match self {
            Denial::MissingComment => WorkflowError::MissingComment {
                action: action.to_string(),
            },
            Denial::AlreadyTerminal { state } => WorkflowError::AlreadyTerminal { state },
            Denial::WrongRole { required } => WorkflowError::WrongRole {
                actor_id: actor_id.to_string(),
                action: action.to_string(),
                required: required
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(" or "),
            },
            Denial::PreconditionNotMet { reason } => WorkflowError::PreconditionNotMet {
                action: action.to_string(),
                reason,
            },
        }
    }
}

pub struct TransitionGuard;

impl TransitionGuard {
    pub fn check(
        instance: &WorkflowInstance,
        action: Action,
        roles: &RoleSet,
        comment: Option<&str>,
    ) -> Result<Decision, Denial> {
        let comment = normalize_comment(comment);
        if action.requires_comment() && comment.is_none() {
            return Err(Denial::MissingComment);
        }

        let from = instance.state;
        let target = action.transition(from);
        if from.is_terminal() && target.is_none() {
            return Err(Denial::AlreadyTerminal { state: from });
        }

        let required = action.required_roles();
        let is_override = if roles.contains_any(required) {
            action.is_administrative()
        } else if roles.is_administrator() {
            true
        } else {
            return Err(Denial::WrongRole { required });
        };

        let to = target.ok_or_else(|| Denial::PreconditionNotMet {
            reason: format!(
                "instance is {}; {} is only valid from {}",
                from,
                action,
                action
                    .valid_from()
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" or ")
            ),
        })?;
        if let Some(Some(at)) = instance.stamps.for_action(action) {
            let reason = match format_timestamp(at) {
                Ok(recorded) => format!("already recorded at {}", recorded),
                Err(_) => "already recorded".to_string(),
            };
            return Err(Denial::PreconditionNotMet { reason });
        }

        Ok(Decision {
            action,
            from,
            to,
            is_override,
            comment,
        })
    }

    /// Every action the guard would currently permit, assuming a comment is
    /// supplied where one is required.
    pub fn allowed_actions(instance: &WorkflowInstance, roles: &RoleSet) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|a| Self::check(instance, *a, roles, Some("-")).is_ok())
            .collect()
    }
}
