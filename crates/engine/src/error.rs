use signoff_storage::StorageError;

use crate::directory::DirectoryError;
use crate::state::WorkflowState;

/// Every failure the engine reports to its caller.
///
/// None of these are retried by the engine. Only `ConcurrentModification`
/// warrants a caller-driven retry, after re-fetching the snapshot.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The actor lacks the role the action requires. An administrator could
    /// perform it as an override.
    #[error("{actor_id} may not {action}: requires the {required} role")]
    WrongRole {
        actor_id: String,
        action: String,
        required: String,
    },

    /// A structural precondition does not hold, e.g. approving before the
    /// counterparty has signed.
    #[error("cannot {action}: {reason}")]
    PreconditionNotMet { action: String, reason: String },

    /// The instance is rejected or taken back and accepts no further changes.
    #[error("instance is {state} and accepts no further changes")]
    AlreadyTerminal { state: WorkflowState },

    /// Reject, clarify, and resubmit need explanatory text.
    #[error("comment is required to {action}")]
    MissingComment { action: String },

    /// Another writer changed the instance first. Re-fetch and retry the
    /// originally intended action.
    #[error("instance {instance_id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        instance_id: String,
        expected_version: i64,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A stored document or audit log cannot be decoded or is inconsistent.
    #[error("corrupt workflow data: {message}")]
    Corrupt { message: String },
}

impl WorkflowError {
    /// Every code [`WorkflowError::kind`] can return.
    pub const KINDS: [&'static str; 9] = [
        "wrong_role",
        "precondition_not_met",
        "already_terminal",
        "missing_comment",
        "concurrent_modification",
        "not_found",
        "storage",
        "directory",
        "corrupt",
    ];

    /// Stable machine-readable code for calling layers.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::WrongRole { .. } => "wrong_role",
            WorkflowError::PreconditionNotMet { .. } => "precondition_not_met",
            WorkflowError::AlreadyTerminal { .. } => "already_terminal",
            WorkflowError::MissingComment { .. } => "missing_comment",
            WorkflowError::ConcurrentModification { .. } => "concurrent_modification",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::Storage(_) => "storage",
            WorkflowError::Directory(_) => "directory",
            WorkflowError::Corrupt { .. } => "corrupt",
        }
    }

    /// Whether re-fetching and retrying the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::ConcurrentModification { .. })
    }
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ConcurrentConflict {
                instance_id,
                expected_version,
            } => WorkflowError::ConcurrentModification {
                instance_id,
                expected_version,
            },
            StorageError::InstanceNotFound { instance_id } => WorkflowError::NotFound {
                kind: "instance",
                id: instance_id,
            },
            other => WorkflowError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_conflict_maps_to_concurrent_modification() {
        let err: WorkflowError = StorageError::ConcurrentConflict {
            instance_id: "inst-1".to_string(),
            expected_version: 3,
        }
        .into();
        assert_eq!(err.kind(), "concurrent_modification");
        assert!(err.is_retryable());
    }

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err: WorkflowError = StorageError::InstanceNotFound {
            instance_id: "inst-9".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "instance not found: inst-9");
        assert!(!err.is_retryable());
    }

    #[test]
    fn messages_say_what_to_fix() {
        let err = WorkflowError::MissingComment {
            action: "reject".to_string(),
        };
        assert_eq!(err.to_string(), "comment is required to reject");
        let err = WorkflowError::AlreadyTerminal {
            state: WorkflowState::Rejected,
        };
        assert_eq!(
            err.to_string(),
            "instance is REJECTED and accepts no further changes"
        );
    }
}
