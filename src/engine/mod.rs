// src/engine/mod.rs

//! Orchestration engine for one run of a task graph.
//!
//! This module ties together:
//! - the per-run scheduler over a lowered graph
//! - the executor that runs each task's tool
//! - the event loop that reacts to task completions and shutdown requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`], and [`runner`] wires both for callers that
//! just want a [`crate::dag::RunReport`].

/// Outcome of a task for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The tool returned an error; the message is kept for the report.
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched task finished.
    TaskCompleted {
        node: crate::dag::NodeId,
        outcome: TaskOutcome,
    },
    /// Stop dispatching; report what has finished so far.
    ShutdownRequested,
}

/// Progress notifications for observers of a run (the watch loop uses these
/// to push style updates before the rest of a rebuild has finished).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    TaskStarted { name: String },
    TaskFinished { name: String, success: bool },
}

pub mod core;
pub mod event_handlers;
pub mod runner;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runner::{GraphRunner, run_with_executor};
pub use runtime::Runtime;
