use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{AuditRecord, InstanceRecord, InstanceWrite, NewAuditRecord};

/// Persistence for workflow documents and their audit trails.
///
/// Writes are staged on a `Snapshot` obtained from `begin_snapshot` and
/// become visible together on `commit_snapshot`. `abort_snapshot`, or simply
/// dropping the snapshot, throws the staged writes away. Reads through
/// `get_instance`, `list_instances` and `list_audit` only ever observe
/// committed data.
///
/// `update_instance` succeeds only when the stored version still equals
/// `expected_version`. A backend may report the mismatch at staging time or
/// at commit time, but in both cases the caller sees
/// `StorageError::ConcurrentConflict` and the snapshot leaves no trace.
///
/// A state change and the audit record describing it are staged on the same
/// snapshot, so one is never committed without the other.
#[async_trait]
pub trait WorkflowStorage: Send + Sync + 'static {
    /// Pending writes of one unit of work.
    type Snapshot: Send;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Publish every write staged on `snapshot`.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Stage a brand new instance at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_instance(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        write: InstanceWrite,
    ) -> Result<(), StorageError>;

    /// Current copy of an instance as seen from inside `snapshot`, including
    /// anything staged on it so far.
    async fn get_instance_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
    ) -> Result<InstanceRecord, StorageError>;

    /// Replace the instance document if nobody bumped the version first.
    /// Yields the version the instance will have after commit.
    async fn update_instance(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        expected_version: i64,
        write: InstanceWrite,
    ) -> Result<i64, StorageError>;

    /// Append an entry to the instance's audit log.
    ///
    /// The backend assigns the next sequence number and chains the digest to
    /// the previous entry. Returns the record as it will be committed.
    async fn append_audit(
        &self,
        snapshot: &mut Self::Snapshot,
        instance_id: &str,
        entry: NewAuditRecord,
    ) -> Result<AuditRecord, StorageError>;

    /// Latest committed copy of an instance.
    async fn get_instance(&self, instance_id: &str) -> Result<InstanceRecord, StorageError>;

    /// List instances ordered by id, optionally filtered by state name.
    async fn list_instances(
        &self,
        state_filter: Option<&str>,
    ) -> Result<Vec<InstanceRecord>, StorageError>;

    /// Every committed audit record of an instance, oldest first. Unknown
    /// instances yield `InstanceNotFound` rather than an empty list.
    async fn list_audit(&self, instance_id: &str) -> Result<Vec<AuditRecord>, StorageError>;
}
