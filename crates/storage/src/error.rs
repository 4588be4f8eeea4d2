/// All errors that can be returned by a WorkflowStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another snapshot committed a
    /// change to the instance first. The expected version was not found.
    #[error("concurrent conflict on instance {instance_id}: expected version {expected_version}")]
    ConcurrentConflict {
        instance_id: String,
        expected_version: i64,
    },

    /// No instance with the given id.
    #[error("instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// An instance with this id already exists.
    #[error("instance already exists: {instance_id}")]
    AlreadyExists { instance_id: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
