// src/dag/scheduler.rs

use tracing::{debug, info, warn};

use crate::dag::graph::{DagGraph, NodeId};
use crate::dag::report::{RunReport, TaskResult, TaskStatus};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{StateManager, deps_satisfied};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::TaskOutcome;
use crate::types::FailurePolicy;

/// Scheduler holds the immutable lowered graph plus mutable per-run state.
///
/// It is responsible for:
/// - deciding when a node is ready to run (all deps succeeded or warned)
/// - recording success, warnings and failures
/// - skipping the dependents of a fatal failure
/// - producing a [`RunReport`] once every node is terminal
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: Vec<TaskInfo>,
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new(graph: DagGraph) -> Self {
        let tasks = graph
            .node_ids()
            .filter_map(|id| {
                let task = graph.task(id)?.clone();
                Some(TaskInfo::new(id, task, graph.dependencies_of(id).to_vec()))
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// Read-only view of a node's run state; `None` for unknown nodes.
    pub fn run_state_of(&self, node: NodeId) -> Option<TaskRunState> {
        let info = self.tasks.get(node)?;
        Some(info.run_state.as_ref().into())
    }

    /// Whether the dependencies of `node` are satisfied in the current run.
    pub fn deps_satisfied(&self, node: NodeId) -> Option<bool> {
        let info = self.tasks.get(node)?;
        Some(deps_satisfied(&self.tasks, info))
    }

    /// Start a new run over the whole graph and return the root nodes.
    pub fn start_run(&mut self) -> Vec<ScheduledTask> {
        self.step_start().newly_scheduled
    }

    /// Handle completion of a node (production API).
    pub fn handle_completion(&mut self, node: NodeId, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.step_completion(node, outcome).newly_scheduled
    }

    /// Manual-step variant of [`Scheduler::start_run`].
    pub fn step_start(&mut self) -> SchedulerStep {
        if let Some(run_id) = self.current_run_id {
            warn!(run_id, "start requested while a run is active; ignoring");
            return SchedulerStep::default();
        }

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        debug!(run_id = self.run_counter, nodes = self.tasks.len(), "scheduler: starting new run");

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        manager.mark_all_pending();
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped: Vec::new(),
            run_just_finished,
        }
    }

    /// Manual-step variant of [`Scheduler::handle_completion`].
    pub fn step_completion(&mut self, node: NodeId, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(node, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let Some(info) = self.tasks.get_mut(node) else {
            warn!(node, "completion for unknown node; ignoring");
            return SchedulerStep::default();
        };
        if info.run_state != Some(RunState::Running) {
            warn!(task = %info.task.name(), node, "completion for a node that is not running; ignoring");
            return SchedulerStep::default();
        }

        let mut step = SchedulerStep::default();
        let policy = info.task.policy();
        match outcome {
            TaskOutcome::Success => {
                info!(task = %info.task.name(), run_id, "task finished");
                info.run_state = Some(RunState::Succeeded);
            }
            TaskOutcome::Failed(message) if policy == FailurePolicy::DiagnosticOnly => {
                warn!(task = %info.task.name(), run_id, error = %message, "task reported problems");
                info.run_state = Some(RunState::Warned(message));
            }
            TaskOutcome::Failed(message) => {
                warn!(
                    task = %info.task.name(),
                    run_id,
                    error = %message,
                    "task failed; skipping its dependents in this run"
                );
                info.run_state = Some(RunState::Failed(message));
                let mut manager =
                    StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                step.newly_skipped = manager.mark_dependents_skipped(node);
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        step.newly_scheduled = manager.collect_new_ready_tasks();
        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Outcome of the most recent run. Nodes that never left `Pending`
    /// (for example after a shutdown) are reported as skipped.
    pub fn report(&self) -> RunReport {
        let results = self
            .tasks
            .iter()
            .map(|info| TaskResult {
                name: info.task.name().to_string(),
                status: match &info.run_state {
                    Some(RunState::Succeeded) => TaskStatus::Succeeded,
                    Some(RunState::Warned(msg)) => TaskStatus::Warned(msg.clone()),
                    Some(RunState::Failed(msg)) => TaskStatus::Failed(msg.clone()),
                    Some(RunState::Running) => {
                        TaskStatus::Failed("interrupted before completion".to_string())
                    }
                    Some(RunState::Pending) | Some(RunState::Skipped) | None => {
                        TaskStatus::Skipped
                    }
                },
            })
            .collect();

        RunReport {
            run_id: self.run_counter,
            results,
        }
    }

    /// Clear `current_run_id` once every node is terminal. Returns `true` if
    /// this call finished the run.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        if manager.all_tasks_terminal() {
            debug!(run_id = self.current_run_id, "scheduler: all tasks terminal; run finished");
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
