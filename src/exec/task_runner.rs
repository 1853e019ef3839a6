// src/exec/task_runner.rs

//! Runs a single task's tool and reports the outcome.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::tasks::TaskContext;

/// Run `task` and send exactly one `TaskCompleted` event for it.
///
/// The tool runs on a separate Tokio task so a panicking tool is reported
/// as a failure instead of taking the run down.
pub async fn run_task(
    task: ScheduledTask,
    ctx: Arc<TaskContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let started = Instant::now();
    let tool = Arc::clone(task.task.tool());

    let joined = tokio::spawn(async move { tool.run(&ctx).await }).await;

    let outcome = match joined {
        Ok(Ok(report)) => {
            debug!(
                task = %task.name(),
                run_id = task.run_id,
                outputs = report.outputs.len(),
                diagnostics = report.diagnostics.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tool finished"
            );
            TaskOutcome::Success
        }
        Ok(Err(err)) => {
            error!(task = %task.name(), run_id = task.run_id, error = %format!("{err:#}"), "task error");
            TaskOutcome::Failed(format!("{err:#}"))
        }
        Err(join_err) => {
            error!(task = %task.name(), run_id = task.run_id, error = %join_err, "task aborted");
            TaskOutcome::Failed(format!("task aborted: {join_err}"))
        }
    };

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            node: task.node,
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name(), "runtime gone before completion could be reported");
    }
}
