//! Persistence layer for signoff workflow instances.
//!
//! A backend stores one JSON document per workflow instance together with an
//! append-only, hash-chained audit log. Mutations happen inside a snapshot
//! (transaction) so a document update and its audit append commit together
//! or not at all.

pub mod conformance;
mod digest;
mod error;
mod memory;
mod record;
mod traits;

pub use digest::chain_digest;
pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{AuditRecord, InstanceRecord, InstanceWrite, NewAuditRecord};
pub use traits::WorkflowStorage;
