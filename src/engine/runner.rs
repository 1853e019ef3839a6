// src/engine/runner.rs

//! One-call execution of a [`TaskGraph`] with the production executor.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::dag::{DagGraph, RunReport, Scheduler, TaskGraph};
use crate::engine::{CoreRuntime, PipelineEvent, Runtime, RuntimeEvent};
use crate::errors::Result;
use crate::exec::{ExecutorBackend, ToolExecutor};
use crate::tasks::TaskContext;

/// Runs task graphs against a shared [`TaskContext`].
#[derive(Debug, Clone)]
pub struct GraphRunner {
    ctx: Arc<TaskContext>,
}

impl GraphRunner {
    pub fn new(ctx: TaskContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Run `graph` to completion. Task failures are recorded in the report;
    /// an `Err` means the graph itself could not be run.
    pub async fn run(&self, graph: &TaskGraph) -> Result<RunReport> {
        self.run_observed(graph, None).await
    }

    /// Like [`GraphRunner::run`], forwarding task progress to `observer`.
    pub async fn run_observed(
        &self,
        graph: &TaskGraph,
        observer: Option<mpsc::UnboundedSender<PipelineEvent>>,
    ) -> Result<RunReport> {
        let dag = DagGraph::lower(graph)?;
        info!(graph = %graph, mode = %self.ctx.mode, "running task graph");

        let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
        let executor = ToolExecutor::new(rt_tx, Arc::clone(&self.ctx));
        run_with_executor(dag, rt_rx, executor, observer).await
    }
}

/// Drive a lowered graph with an arbitrary executor backend.
pub async fn run_with_executor<E: ExecutorBackend>(
    dag: DagGraph,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    observer: Option<mpsc::UnboundedSender<PipelineEvent>>,
) -> Result<RunReport> {
    let core = CoreRuntime::new(Scheduler::new(dag));
    let mut runtime = Runtime::new(core, event_rx, executor);
    if let Some(observer) = observer {
        runtime = runtime.with_observer(observer);
    }
    runtime.run().await
}
