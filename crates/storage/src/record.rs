use serde::{Deserialize, Serialize};

/// A workflow instance as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    /// Denormalized state name, kept alongside the document for filtering.
    pub state: String,
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
    /// The full instance, serialized by the engine.
    pub document: serde_json::Value,
}

/// The mutable part of an instance record, supplied on insert and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceWrite {
    pub state: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
    pub document: serde_json::Value,
}

/// An audit entry as handed to the backend for appending.
///
/// The backend assigns `sequence` and `digest` when it appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub action: String,
    pub actor_id: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
    pub payload: serde_json::Value,
}

/// One committed entry of an instance's audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub instance_id: String,
    /// 1-based position in the instance's log.
    pub sequence: i64,
    pub action: String,
    pub actor_id: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
    pub payload: serde_json::Value,
    /// Hex SHA-256 over the previous entry's digest and this entry's content.
    pub digest: String,
}
