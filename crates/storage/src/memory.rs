//! In-process `WorkflowStorage` backend.
//!
//! Writes are staged in the snapshot and validated again at commit time under
//! a single write lock, so a commit either applies every staged write or none.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::digest::chain_digest;
use crate::error::StorageError;
use crate::record::{AuditRecord, InstanceRecord, InstanceWrite, NewAuditRecord};
use crate::traits::WorkflowStorage;

#[derive(Debug, Default)]
struct Inner {
    instances: BTreeMap<String, InstanceRecord>,
    audit: BTreeMap<String, Vec<AuditRecord>>,
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Insert(InstanceRecord),
    Update {
        expected_version: i64,
        record: InstanceRecord,
    },
    Audit(AuditRecord),
}

/// Pending writes of one in-memory transaction.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    writes: Vec<StagedWrite>,
}

impl MemorySnapshot {
    fn staged_instance(&self, instance_id: &str) -> Option<&InstanceRecord> {
        self.writes.iter().rev().find_map(|w| match w {
            StagedWrite::Insert(r) | StagedWrite::Update { record: r, .. }
                if r.instance_id == instance_id =>
            {
                Some(r)
            }
            _ => None,
        })
    }

    fn staged_audit_tail(&self, instance_id: &str) -> Option<&AuditRecord> {
        self.writes.iter().rev().find_map(|w| match w {
            StagedWrite::Audit(r) if r.instance_id == instance_id => Some(r),
            _ => None,
        })
    }
}

/// Thread-safe in-memory storage. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StorageError> {
        self.inner
            .read()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }

    fn current(
        &self,
        snapshot: &MemorySnapshot,
        instance_id: &str,
    ) -> Result<InstanceRecord, StorageError> {
        if let Some(staged) = snapshot.staged_instance(instance_id) {
            return Ok(staged.clone());
        }
        self.read()?
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }
}

#[async_trait]
impl WorkflowStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut inner = self.write()?;

        // Validate every write against committed data plus the writes before
        // it, then apply all of them.
        let mut instances: BTreeMap<String, InstanceRecord> = BTreeMap::new();
        let mut appended: BTreeMap<String, Vec<AuditRecord>> = BTreeMap::new();

        for write in snapshot.writes {
            match write {
                StagedWrite::Insert(record) => {
                    if instances.contains_key(&record.instance_id)
                        || inner.instances.contains_key(&record.instance_id)
                    {
                        return Err(StorageError::AlreadyExists {
                            instance_id: record.instance_id,
                        });
                    }
                    instances.insert(record.instance_id.clone(), record);
                }
                StagedWrite::Update {
                    expected_version,
                    record,
                } => {
                    let found = instances
                        .get(&record.instance_id)
                        .or_else(|| inner.instances.get(&record.instance_id))
                        .map(|r| r.version)
                        .ok_or_else(|| StorageError::InstanceNotFound {
                            instance_id: record.instance_id.clone(),
                        })?;
                    if found != expected_version {
                        return Err(StorageError::ConcurrentConflict {
                            instance_id: record.instance_id,
                            expected_version,
                        });
                    }
                    instances.insert(record.instance_id.clone(), record);
                }
                StagedWrite::Audit(record) => {
                    let committed = inner.audit.get(&record.instance_id).map_or(0, Vec::len);
                    let pending = appended.get(&record.instance_id).map_or(0, Vec::len);
                    let expected_sequence = (committed + pending) as i64 + 1;
                    if record.sequence != expected_sequence {
                        return Err(StorageError::ConcurrentConflict {
                            instance_id: record.instance_id,
                            expected_version: record.sequence - 1,
                        });
                    }
                    appended
                        .entry(record.instance_id.clone())
                        .or_default()
                        .push(record);
                }
            }
        }

        inner.instances.extend(instances);
        for (instance_id, records) in appended {
            inner.audit.entry(instance_id).or_default().extend(records);
        }
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn insert_instance(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        write: InstanceWrite,
    ) -> Result<(), StorageError> {
        if snapshot.staged_instance(instance_id).is_some()
            || self.read()?.instances.contains_key(instance_id)
        {
            return Err(StorageError::AlreadyExists {
                instance_id: instance_id.to_string(),
            });
        }
        snapshot.writes.push(StagedWrite::Insert(InstanceRecord {
            instance_id: instance_id.to_string(),
            state: write.state,
            version: 0,
            updated_at: write.updated_at,
            document: write.document,
        }));
        Ok(())
    }

    async fn get_instance_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
    ) -> Result<InstanceRecord, StorageError> {
        self.current(snapshot, instance_id)
    }

    async fn update_instance(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        expected_version: i64,
        write: InstanceWrite,
    ) -> Result<i64, StorageError> {
        let current = self.current(snapshot, instance_id)?;
        if current.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                instance_id: instance_id.to_string(),
                expected_version,
            });
        }
        let version = expected_version + 1;
        snapshot.writes.push(StagedWrite::Update {
            expected_version,
            record: InstanceRecord {
                instance_id: instance_id.to_string(),
                state: write.state,
                version,
                updated_at: write.updated_at,
                document: write.document,
            },
        });
        Ok(version)
    }

    async fn append_audit(
        &self,
        snapshot: &mut MemorySnapshot,
        instance_id: &str,
        entry: NewAuditRecord,
    ) -> Result<AuditRecord, StorageError> {
        // The instance must exist, committed or staged.
        self.current(snapshot, instance_id)?;

        let (sequence, previous) = match snapshot.staged_audit_tail(instance_id) {
            Some(tail) => (tail.sequence + 1, Some(tail.digest.clone())),
            None => {
                let inner = self.read()?;
                match inner.audit.get(instance_id).and_then(|log| log.last()) {
                    Some(tail) => (tail.sequence + 1, Some(tail.digest.clone())),
                    None => (1, None),
                }
            }
        };

        let digest = chain_digest(
            previous.as_deref(),
            instance_id,
            sequence,
            &entry.action,
            &entry.actor_id,
            &entry.recorded_at,
            &entry.payload,
        );
        let record = AuditRecord {
            instance_id: instance_id.to_string(),
            sequence,
            action: entry.action,
            actor_id: entry.actor_id,
            recorded_at: entry.recorded_at,
            payload: entry.payload,
            digest,
        };
        snapshot.writes.push(StagedWrite::Audit(record.clone()));
        Ok(record)
    }

    async fn get_instance(&self, instance_id: &str) -> Result<InstanceRecord, StorageError> {
        self.read()?
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn list_instances(
        &self,
        state_filter: Option<&str>,
    ) -> Result<Vec<InstanceRecord>, StorageError> {
        Ok(self
            .read()?
            .instances
            .values()
            .filter(|r| state_filter.map_or(true, |s| r.state == s))
            .cloned()
            .collect())
    }

    async fn list_audit(&self, instance_id: &str) -> Result<Vec<AuditRecord>, StorageError> {
        let inner = self.read()?;
        if !inner.instances.contains_key(instance_id) {
            return Err(StorageError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            });
        }
        Ok(inner.audit.get(instance_id).cloned().unwrap_or_default())
    }
}
