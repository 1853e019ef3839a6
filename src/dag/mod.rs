// src/dag/mod.rs

//! Task composition and per-run scheduling.
//!
//! - [`task_graph`] is the user-facing sequence/parallel composition tree.
//! - [`graph`] lowers a composition into explicit dependency edges.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run, and which are skipped after a failure.
//! - [`task_info`] provides task metadata and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.
//! - [`report`] is the aggregate outcome of a finished run.

pub mod graph;
pub mod report;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_graph;
pub mod task_info;

pub use graph::{DagGraph, NodeId};
pub use report::{RunReport, TaskResult, TaskStatus};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_graph::{TaskGraph, parallel, sequence};
pub use task_info::{ScheduledTask, TaskRunState};
