use std::path::Path;

use serde::Serialize;
use signoff_engine::{
    ActionRequest, AuditEntry, EngineConfig, InstanceSnapshot, ManualClock, NoopSink,
    StaticDirectory, VerifiedHistory, WorkflowEngine, WorkflowError, WorkflowState,
};
use signoff_storage::MemoryStorage;
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::scenario::{Scenario, StepOp};
use crate::{fail, logging, OutputFormat};

type Engine = WorkflowEngine<MemoryStorage, StaticDirectory, NoopSink>;

#[derive(Debug, Serialize)]
struct StepReport {
    step: usize,
    description: String,
    outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    state: WorkflowState,
}

#[derive(Debug, Serialize)]
struct RunReport {
    instance_id: String,
    steps: Vec<StepReport>,
    snapshot: InstanceSnapshot,
    audit_log: Vec<AuditEntry>,
    verified: VerifiedHistory,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

pub(crate) fn cmd_run(
    scenario_path: &Path,
    config_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let config = match config_path {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| {
            fail(
                &format!("error in config '{}': {}", path.display(), e),
                output,
                quiet,
            )
        }),
        None => EngineConfig::default(),
    };
    if let Err(e) = logging::init(&config.logging) {
        fail(&e, output, quiet);
    }
    let scenario = Scenario::load(scenario_path).unwrap_or_else(|e| fail(&e, output, quiet));

    let rt = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| fail(&format!("failed to create tokio runtime: {}", e), output, quiet));
    let report = match rt.block_on(run_scenario(&scenario, &config)) {
        Ok(report) => report,
        Err(e) => fail(&e, output, quiet),
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(&format!("error serializing report: {}", e), output, quiet),
        },
        OutputFormat::Text => print_text(&report, quiet),
    }

    if let Some(failure) = &report.failure {
        fail(failure, output, quiet);
    }
}

async fn run_scenario(scenario: &Scenario, config: &EngineConfig) -> Result<RunReport, String> {
    let clock = ManualClock::new(scenario.start.unwrap_or_else(OffsetDateTime::now_utc));
    let engine: Engine = WorkflowEngine::from_config(MemoryStorage::new(), config, NoopSink)
        .with_clock(clock.clone());

    let instance_id = engine
        .create_instance(scenario.parties.clone(), scenario.tasks.clone())
        .await
        .map_err(engine_error)?;
    info!(%instance_id, steps = scenario.steps.len(), "running scenario");

    let mut steps = Vec::with_capacity(scenario.steps.len());
    let mut failure = None;
    for (i, step) in scenario.steps.iter().enumerate() {
        let result = match &step.op {
            StepOp::Wait { days } => {
                clock.advance(Duration::days(*days)).map_err(|e| {
                    format!("step {} ({}): {}", i + 1, step.op.describe(), e)
                })?;
                Ok(())
            }
            op => execute(&engine, &instance_id, op).await,
        };
        let (outcome, message) = match &result {
            Ok(()) => ("ok".to_string(), None),
            Err(e) => (e.kind().to_string(), Some(e.to_string())),
        };
        let state = engine
            .get_snapshot(&instance_id)
            .await
            .map_err(engine_error)?
            .state;
        let mismatch = step
            .expect
            .as_ref()
            .filter(|expected| **expected != outcome)
            .map(|expected| {
                format!(
                    "step {} ({}): expected {}, got {}",
                    i + 1,
                    step.op.describe(),
                    expected,
                    outcome
                )
            });
        steps.push(StepReport {
            step: i + 1,
            description: step.op.describe(),
            outcome,
            message,
            state,
        });
        if mismatch.is_some() {
            failure = mismatch;
            break;
        }
    }

    Ok(RunReport {
        snapshot: engine.get_snapshot(&instance_id).await.map_err(engine_error)?,
        audit_log: engine.get_audit_log(&instance_id).await.map_err(engine_error)?,
        verified: engine.verify_history(&instance_id).await.map_err(engine_error)?,
        instance_id,
        steps,
        failure,
    })
}

fn engine_error(e: WorkflowError) -> String {
    format!("error: {}", e)
}

/// Run one engine operation. Waits only move the clock and never get here.
async fn execute(engine: &Engine, instance_id: &str, op: &StepOp) -> Result<(), WorkflowError> {
    match op {
        StepOp::Action {
            actor,
            action,
            comment,
        } => {
            let mut request = ActionRequest::new(instance_id, actor, *action);
            request.comment = comment.clone();
            engine.apply_action(request).await.map(|_| ())
        }
        StepOp::Task {
            actor,
            task_id,
            status,
            comment,
        } => engine
            .update_task_status(instance_id, *task_id, actor, *status, comment.as_deref())
            .await
            .map(|_| ()),
        StepOp::Reassign {
            actor,
            supervisor,
            comment,
        } => engine
            .reassign_supervisor(instance_id, actor, supervisor, comment.as_deref())
            .await
            .map(|_| ()),
        StepOp::AddTask { actor, description } => engine
            .add_task(instance_id, actor, description)
            .await
            .map(|_| ()),
        StepOp::RemoveTask { actor, task_id } => engine
            .remove_task(instance_id, *task_id, actor)
            .await
            .map(|_| ()),
        StepOp::Wait { .. } => Ok(()),
    }
}

fn print_text(report: &RunReport, quiet: bool) {
    if !quiet {
        for step in &report.steps {
            match &step.message {
                None => println!(
                    "step {:>2}  {}: ok {}",
                    step.step, step.description, step.state
                ),
                Some(message) => println!(
                    "step {:>2}  {}: error {}: {}",
                    step.step, step.description, step.outcome, message
                ),
            }
        }
    }

    let snapshot = &report.snapshot;
    println!(
        "instance {}: {} ({})",
        report.instance_id, snapshot.state, snapshot.projected.label
    );
    if quiet {
        return;
    }
    println!("  next: {}", snapshot.projected.hint);
    println!(
        "  parties: initiator {}, counterparty {}, supervisor {}",
        snapshot.parties.initiator_id,
        snapshot.parties.counterparty_id,
        snapshot.parties.supervisor_id
    );
    for task in &snapshot.tasks {
        println!(
            "  task {} [{}] {}",
            task.id, task.current_status, task.description
        );
    }
    println!("audit log:");
    for entry in &report.audit_log {
        println!(
            "  {:>2} {} {} {} -> {}{}{}",
            entry.sequence,
            entry.actor_id,
            entry.action,
            entry.old_state,
            entry.new_state,
            entry
                .comment
                .as_deref()
                .map(|c| format!(" \"{}\"", c))
                .unwrap_or_default(),
            if entry.is_override { " (override)" } else { "" }
        );
    }
    println!(
        "history verified: {} entries, {} task update(s)",
        report.verified.entries, report.verified.task_activities
    );
}
