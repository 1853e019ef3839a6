// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::graph::NodeId;
use crate::dag::task_info::ScheduledTask;

/// Structured result of a single scheduler "step".
///
/// Useful for tests that step a run manually and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Nodes that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Nodes that were skipped in this step because of an upstream failure.
    pub newly_skipped: Vec<NodeId>,
    /// Whether this step finished the current run.
    pub run_just_finished: bool,
}
