// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces an updated scheduler
//! state plus a list of commands describing what the IO shell should do
//! next. It has no channels, no Tokio types, and performs no IO, so it can
//! be driven step by step in tests.

use crate::dag::{NodeId, RunReport, Scheduler};
use crate::engine::RuntimeEvent;
use crate::engine::event_handlers::{
    CoreStep, handle_shutdown, handle_start, handle_task_completion,
};

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Whether no run is active.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Name of the task behind `node`, for logging and observers.
    pub fn task_name(&self, node: NodeId) -> Option<&str> {
        self.scheduler.graph().task(node).map(|t| t.name())
    }

    /// Begin a run; returns the root nodes to dispatch.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted { node, outcome } => {
                handle_task_completion(&mut self.scheduler, node, outcome)
            }
            RuntimeEvent::ShutdownRequested => handle_shutdown(),
        }
    }

    pub fn report(&self) -> RunReport {
        self.scheduler.report()
    }
}
