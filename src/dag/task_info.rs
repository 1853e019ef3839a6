// src/dag/task_info.rs

//! Task metadata and per-run state management.

use crate::dag::graph::NodeId;
use crate::tasks::Task;

/// Per-run state of a node (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    /// Failed, but the task's policy does not block dependents.
    Warned(String),
    Failed(String),
    /// Never started because an upstream task failed.
    Skipped,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }

    /// Whether dependents may start after this state.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Warned(_))
    }
}

/// Public, read-only view of a node's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// No run has included the node yet.
    NotInRun,
    Pending,
    Running,
    Succeeded,
    Warned,
    Failed,
    Skipped,
}

impl From<Option<&RunState>> for TaskRunState {
    fn from(state: Option<&RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Succeeded) => TaskRunState::Succeeded,
            Some(RunState::Warned(_)) => TaskRunState::Warned,
            Some(RunState::Failed(_)) => TaskRunState::Failed,
            Some(RunState::Skipped) => TaskRunState::Skipped,
        }
    }
}

/// Static node information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub node: NodeId,
    pub task: Task,
    /// Direct dependencies of this node.
    pub deps: Vec<NodeId>,
    /// Per-run state (None before the first run).
    pub run_state: Option<RunState>,
}

impl TaskInfo {
    pub fn new(node: NodeId, task: Task, deps: Vec<NodeId>) -> Self {
        Self {
            node,
            task,
            deps,
            run_state: None,
        }
    }
}

/// A node the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub node: NodeId,
    pub task: Task,
    /// All nodes dispatched for the same run share the same `run_id`.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            node: info.node,
            task: info.task.clone(),
            run_id,
        }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }
}
