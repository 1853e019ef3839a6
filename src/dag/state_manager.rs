// src/dag/state_manager.rs

//! Per-run state transitions for the nodes of one lowered graph.

use tracing::{debug, info};

use crate::dag::DagGraph;
use crate::dag::graph::NodeId;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};

/// Mutates the per-run state of every node in a run.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut [TaskInfo],
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a DagGraph, tasks: &'a mut [TaskInfo], current_run_id: Option<u64>) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Every run executes the whole graph: reset all nodes to `Pending`.
    pub fn mark_all_pending(&mut self) {
        for info in self.tasks.iter_mut() {
            info.run_state = Some(RunState::Pending);
        }
    }

    /// Mark every not-yet-started transitive dependent of `failed` as
    /// `Skipped`. Running nodes are left alone; siblings are never cancelled.
    pub fn mark_dependents_skipped(&mut self, failed: NodeId) -> Vec<NodeId> {
        let mut stack: Vec<NodeId> = self.graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(node) = stack.pop() {
            let Some(info) = self.tasks.get_mut(node) else {
                continue;
            };
            if matches!(info.run_state, Some(RunState::Pending)) {
                info.run_state = Some(RunState::Skipped);
                debug!(
                    task = %info.task.name(),
                    node,
                    "skipping task due to upstream failure"
                );
                newly_skipped.push(node);
                stack.extend_from_slice(self.graph.dependents_of(node));
            }
        }

        newly_skipped
    }

    /// Collect `Pending` nodes whose dependencies are satisfied, mark them
    /// `Running`, and return them as [`ScheduledTask`]s.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let candidates: Vec<NodeId> = self
            .tasks
            .iter()
            .filter(|info| {
                matches!(info.run_state, Some(RunState::Pending))
                    && deps_satisfied(self.tasks, info)
            })
            .map(|info| info.node)
            .collect();

        let run_id = self.current_run_id.unwrap_or(0);
        let mut ready = Vec::with_capacity(candidates.len());
        for node in candidates {
            let info = &mut self.tasks[node];
            info!(task = %info.task.name(), run_id, "starting task");
            info.run_state = Some(RunState::Running);
            ready.push(ScheduledTask::from_task_info(info, run_id));
        }

        ready
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks
            .iter()
            .all(|info| info.run_state.as_ref().is_none_or(RunState::is_terminal))
    }
}

/// Whether every dependency of `info` ended in a state that lets it start.
pub fn deps_satisfied(tasks: &[TaskInfo], info: &TaskInfo) -> bool {
    info.deps.iter().all(|&dep| {
        tasks
            .get(dep)
            .and_then(|d| d.run_state.as_ref())
            .is_some_and(RunState::satisfies_dependents)
    })
}
