// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::{RunReport, ScheduledTask};
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, PipelineEvent, RuntimeEvent};

/// Drives one run of the scheduler in response to [`RuntimeEvent`]s and
/// delegates task execution to an [`ExecutorBackend`].
///
/// All run semantics live in [`CoreRuntime`]; this shell only moves events
/// and tasks between channels.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    observer: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            observer: None,
        }
    }

    /// Forward task start/finish notifications to `observer`.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the graph to completion and return its report.
    pub async fn run(mut self) -> Result<RunReport> {
        let start = self.core.start();
        let mut keep_running = start.keep_running;
        for command in start.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let Some(event) = self.event_rx.recv().await else {
                info!("runtime event channel closed; stopping run");
                break;
            };
            debug!(?event, "runtime received event");

            if let RuntimeEvent::TaskCompleted { node, outcome } = &event {
                if let Some(name) = self.core.task_name(*node) {
                    self.notify(PipelineEvent::TaskFinished {
                        name: name.to_string(),
                        success: outcome.is_success(),
                    });
                }
            }

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }
            keep_running = step.keep_running;
        }

        let report = self.core.report();
        debug!(run_id = report.run_id, success = report.is_success(), "run finished");
        Ok(report)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
            CoreCommand::RequestExit => debug!("core issued RequestExit command"),
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        for task in &tasks {
            self.notify(PipelineEvent::TaskStarted {
                name: task.name().to_string(),
            });
        }
        let names: Vec<_> = tasks.iter().map(|t| t.name()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }

    fn notify(&self, event: PipelineEvent) {
        if let Some(observer) = &self.observer {
            // Observers may go away mid-run; that never affects the run.
            let _ = observer.send(event);
        }
    }
}
