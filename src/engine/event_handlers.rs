// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{NodeId, ScheduledTask, Scheduler};
use crate::engine::TaskOutcome;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// The run is over; the shell should stop.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn exit() -> Self {
        Self {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        }
    }
}

/// Start a run over the whole graph.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.step_start();
    if step.run_just_finished {
        // Empty graph: nothing to dispatch.
        return CoreStep::exit();
    }

    let mut commands = Vec::new();
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    CoreStep {
        commands,
        keep_running: true,
    }
}

/// Handle completion of a dispatched node.
///
/// Newly ready dependents are dispatched; once every node is terminal the
/// core asks the shell to exit.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    node: NodeId,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.step_completion(node, outcome);

    let mut commands = Vec::new();
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    if step.run_just_finished {
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }

    CoreStep {
        commands,
        keep_running: true,
    }
}

/// Shutdown: nothing new is dispatched and the loop stops.
pub fn handle_shutdown() -> CoreStep {
    CoreStep::exit()
}
