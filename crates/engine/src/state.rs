//! Workflow states, actions, and the transition table.
//!
//! The table lives in [`Action::transition`]. Every other component (guard,
//! engine, replay, projection) asks it rather than matching on states itself,
//! so adding a state touches one match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// The lifecycle position of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Created,
    SignedByInitiator,
    SignedByCounterparty,
    NeedClarification,
    Resubmitted,
    ApprovedBySupervisor,
    TakenOver,
    TakenBack,
    Rejected,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 9] = [
        WorkflowState::Created,
        WorkflowState::SignedByInitiator,
        WorkflowState::SignedByCounterparty,
        WorkflowState::NeedClarification,
        WorkflowState::Resubmitted,
        WorkflowState::ApprovedBySupervisor,
        WorkflowState::TakenOver,
        WorkflowState::TakenBack,
        WorkflowState::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Created => "CREATED",
            WorkflowState::SignedByInitiator => "SIGNED_BY_INITIATOR",
            WorkflowState::SignedByCounterparty => "SIGNED_BY_COUNTERPARTY",
            WorkflowState::NeedClarification => "NEED_CLARIFICATION",
            WorkflowState::Resubmitted => "RESUBMITTED",
            WorkflowState::ApprovedBySupervisor => "APPROVED_BY_SUPERVISOR",
            WorkflowState::TakenOver => "TAKEN_OVER",
            WorkflowState::TakenBack => "TAKEN_BACK",
            WorkflowState::Rejected => "REJECTED",
        }
    }

    /// No action other than an administrator `reopen` leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::TakenBack | WorkflowState::Rejected)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown workflow state '{}'", s))
    }
}

/// A workflow-level transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SignInitiator,
    SignCounterparty,
    Approve,
    Reject,
    RequestClarification,
    Resubmit,
    TakeOver,
    TakeBack,
    /// Administrator-only: return a rejected instance to `CREATED`.
    Reopen,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::SignInitiator,
        Action::SignCounterparty,
        Action::Approve,
        Action::Reject,
        Action::RequestClarification,
        Action::Resubmit,
        Action::TakeOver,
        Action::TakeBack,
        Action::Reopen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::SignInitiator => "sign_initiator",
            Action::SignCounterparty => "sign_counterparty",
            Action::Approve => "approve",
            Action::Reject => "reject",
            Action::RequestClarification => "request_clarification",
            Action::Resubmit => "resubmit",
            Action::TakeOver => "take_over",
            Action::TakeBack => "take_back",
            Action::Reopen => "reopen",
        }
    }

    /// The transition table: the state this action leads to from `from`, or
    /// `None` when the action is not defined there.
    pub fn transition(self, from: WorkflowState) -> Option<WorkflowState> {
        use WorkflowState::*;
        match (self, from) {
            (Action::SignInitiator, Created) => Some(SignedByInitiator),
            (Action::SignCounterparty, SignedByInitiator) => Some(SignedByCounterparty),
            (Action::Approve, SignedByCounterparty | Resubmitted) => Some(ApprovedBySupervisor),
            (Action::Reject, SignedByCounterparty | Resubmitted) => Some(Rejected),
            (Action::RequestClarification, SignedByCounterparty | Resubmitted) => {
                Some(NeedClarification)
            }
            (Action::Resubmit, NeedClarification) => Some(Resubmitted),
            (Action::TakeOver, ApprovedBySupervisor) => Some(TakenOver),
            (Action::TakeBack, TakenOver) => Some(TakenBack),
            (Action::Reopen, Rejected) => Some(Created),
            _ => None,
        }
    }

    /// States this action is defined from, in table order.
    pub fn valid_from(self) -> Vec<WorkflowState> {
        WorkflowState::ALL
            .into_iter()
            .filter(|s| self.transition(*s).is_some())
            .collect()
    }

    /// Roles that perform this action without an override.
    pub fn required_roles(self) -> &'static [Role] {
        match self {
            Action::SignInitiator | Action::Resubmit | Action::TakeBack => &[Role::Initiator],
            Action::SignCounterparty => &[Role::Counterparty],
            Action::TakeOver => &[Role::Initiator, Role::Counterparty],
            Action::Approve | Action::Reject | Action::RequestClarification => &[Role::Supervisor],
            Action::Reopen => &[Role::Administrator],
        }
    }

    /// Reject, clarify, and resubmit carry mandatory text.
    pub fn requires_comment(self) -> bool {
        matches!(
            self,
            Action::Reject | Action::RequestClarification | Action::Resubmit
        )
    }

    /// Administrative actions are always audited as overrides.
    pub fn is_administrative(self) -> bool {
        matches!(self, Action::Reopen)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_chain_is_sequential() {
        let chain = [
            (Action::SignInitiator, WorkflowState::SignedByInitiator),
            (Action::SignCounterparty, WorkflowState::SignedByCounterparty),
            (Action::Approve, WorkflowState::ApprovedBySupervisor),
            (Action::TakeOver, WorkflowState::TakenOver),
            (Action::TakeBack, WorkflowState::TakenBack),
        ];
        let mut state = WorkflowState::Created;
        for (action, expected) in chain {
            state = action.transition(state).expect("defined transition");
            assert_eq!(state, expected);
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn approve_cannot_skip_counterparty() {
        assert_eq!(Action::Approve.transition(WorkflowState::Created), None);
        assert_eq!(
            Action::Approve.transition(WorkflowState::SignedByInitiator),
            None
        );
    }

    #[test]
    fn supervisor_decisions_valid_from_review_states() {
        for action in [
            Action::Approve,
            Action::Reject,
            Action::RequestClarification,
        ] {
            assert_eq!(
                action.valid_from(),
                vec![
                    WorkflowState::SignedByCounterparty,
                    WorkflowState::Resubmitted
                ]
            );
        }
    }

    #[test]
    fn no_transition_leaves_terminal_states_except_reopen() {
        for action in Action::ALL {
            assert_eq!(action.transition(WorkflowState::TakenBack), None);
            if action != Action::Reopen {
                assert_eq!(action.transition(WorkflowState::Rejected), None);
            }
        }
        assert_eq!(
            Action::Reopen.transition(WorkflowState::Rejected),
            Some(WorkflowState::Created)
        );
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        for state in WorkflowState::ALL {
            assert_eq!(state.as_str().parse::<WorkflowState>(), Ok(state));
        }
        assert!("approve_all".parse::<Action>().is_err());
    }

    #[test]
    fn serde_names_match_display() {
        let json = serde_json::to_string(&WorkflowState::NeedClarification).unwrap();
        assert_eq!(json, "\"NEED_CLARIFICATION\"");
        let json = serde_json::to_string(&Action::RequestClarification).unwrap();
        assert_eq!(json, "\"request_clarification\"");
    }
}
