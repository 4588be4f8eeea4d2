//! Sequential multi-party approval workflows.
//!
//! An initiator signs, a counterparty countersigns, a supervisor approves,
//! rejects or asks for clarification, and the approved request is then taken
//! over and taken back. Each instance carries independent tasks, an
//! append-only audit trail and a derived display status.
//!
//! [`WorkflowEngine`] is the entry point. It is generic over its storage
//! backend ([`signoff_storage::WorkflowStorage`]), its [`ActorDirectory`] and
//! its [`NotificationSink`].

pub mod audit;
pub mod clock;
pub mod config;
pub mod directory;
mod engine;
pub mod error;
pub mod guard;
pub mod instance;
mod lock;
pub mod notify;
pub mod projection;
pub mod role;
pub mod state;
pub mod task;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use clock::{Clock, ClockError, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use directory::{ActorDirectory, DirectoryError, StaticDirectory};
pub use engine::{
    ActionOutcome, ActionRequest, InstanceSnapshot, TaskUpdate, VerifiedHistory, WorkflowEngine,
};
pub use error::WorkflowError;
pub use guard::{Decision, Denial, TransitionGuard};
pub use instance::{Genesis, Parties, Stamps, WorkflowInstance};
pub use notify::{NoopSink, NotificationSink, RecordingSink, WorkflowEvent};
pub use projection::{project, Badge, ProjectedStatus, ProjectionPolicy};
pub use role::{ActorClaims, Role, RoleResolver, RoleSet};
pub use state::{Action, WorkflowState};
pub use task::{TaskActivity, TaskChange, TaskId, TaskProgress, TaskRecord, TaskStatus};
