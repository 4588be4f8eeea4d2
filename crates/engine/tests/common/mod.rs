//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use signoff_engine::{
    Action, ActionOutcome, ActionRequest, ManualClock, Parties, RecordingSink, StaticDirectory,
    WorkflowEngine, WorkflowError,
};
use signoff_storage::MemoryStorage;
use time::macros::datetime;
use time::Duration;

pub type TestEngine = WorkflowEngine<MemoryStorage, StaticDirectory, RecordingSink>;

pub struct Harness {
    pub engine: TestEngine,
    pub clock: ManualClock,
    pub sink: RecordingSink,
}

/// An engine over fresh in-memory storage with `HR` as the only administrator.
pub fn harness() -> Harness {
    let clock = ManualClock::new(datetime!(2025-03-03 9:00 UTC));
    let sink = RecordingSink::new();
    let engine = WorkflowEngine::new(MemoryStorage::new(), StaticDirectory::new(["HR"]), sink.clone())
        .with_clock(clock.clone());
    Harness {
        engine,
        clock,
        sink,
    }
}

impl Harness {
    /// E1 initiates, E2 is the counterparty, M1 supervises.
    pub async fn create(&self, tasks: &[&str]) -> String {
        self.engine
            .create_instance(
                Parties::new("E1", "E2", "M1"),
                tasks.iter().map(|t| t.to_string()).collect(),
            )
            .await
            .expect("create instance")
    }

    /// Apply `action` one hour after the previous step.
    pub async fn act(
        &self,
        id: &str,
        actor: &str,
        action: Action,
        comment: Option<&str>,
    ) -> Result<ActionOutcome, WorkflowError> {
        self.clock
            .advance(Duration::hours(1))
            .expect("clock stays in range");
        let mut request = ActionRequest::new(id, actor, action);
        request.comment = comment.map(str::to_string);
        self.engine.apply_action(request).await
    }

    /// Drive a fresh instance to SIGNED_BY_COUNTERPARTY.
    pub async fn countersigned(&self, tasks: &[&str]) -> String {
        let id = self.create(tasks).await;
        self.act(&id, "E1", Action::SignInitiator, None)
            .await
            .expect("initiator signs");
        self.act(&id, "E2", Action::SignCounterparty, None)
            .await
            .expect("counterparty signs");
        id
    }
}
