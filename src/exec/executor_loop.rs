// src/exec/executor_loop.rs

//! Loop that receives scheduled tasks and runs each one concurrently.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::task_runner::run_task;
use crate::tasks::TaskContext;

/// Spawn the background executor loop.
///
/// The returned sender is what [`super::ToolExecutor`] dispatches into.
/// Every scheduled task runs on its own Tokio task, so siblings of a
/// parallel group execute concurrently. The loop ends when every sender is
/// dropped.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    ctx: Arc<TaskContext>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        debug!("executor loop started");

        while let Some(task) = rx.recv().await {
            let rt_tx = runtime_tx.clone();
            let ctx = Arc::clone(&ctx);
            tokio::spawn(run_task(task, ctx, rt_tx));
        }

        debug!("executor loop finished (channel closed)");
    });

    tx
}
