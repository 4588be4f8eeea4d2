//! Outbound notifications.
//!
//! Sinks are called after the storage commit, once per successful change and
//! never for a failed one. They must not block; delivery is fire-and-forget.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::state::{Action, WorkflowState};
use crate::task::{TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Created {
        instance_id: String,
        initiator_id: String,
    },
    Transitioned {
        instance_id: String,
        actor_id: String,
        action: Action,
        from: WorkflowState,
        to: WorkflowState,
        is_override: bool,
    },
    TaskUpdated {
        instance_id: String,
        actor_id: String,
        task_id: TaskId,
        old_status: TaskStatus,
        new_status: TaskStatus,
        is_override: bool,
    },
    SupervisorReassigned {
        instance_id: String,
        actor_id: String,
        previous: String,
        replacement: String,
    },
    TaskAdded {
        instance_id: String,
        actor_id: String,
        task_id: TaskId,
    },
    TaskRemoved {
        instance_id: String,
        actor_id: String,
        task_id: TaskId,
    },
}

impl WorkflowEvent {
    pub fn instance_id(&self) -> &str {
        match self {
            WorkflowEvent::Created { instance_id, .. }
            | WorkflowEvent::Transitioned { instance_id, .. }
            | WorkflowEvent::TaskUpdated { instance_id, .. }
            | WorkflowEvent::SupervisorReassigned { instance_id, .. }
            | WorkflowEvent::TaskAdded { instance_id, .. }
            | WorkflowEvent::TaskRemoved { instance_id, .. } => instance_id,
        }
    }
}

pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, event: &WorkflowEvent);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, event: &WorkflowEvent) {
        (**self).notify(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: &WorkflowEvent) {}
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &WorkflowEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
