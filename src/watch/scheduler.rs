// src/watch/scheduler.rs

//! Pure watch-mode state machine.
//!
//! ```text
//! Idle -> Building -> Serving -> Rebuilding -> Serving -> ... -> ShuttingDown -> Idle
//! ```
//!
//! Like [`crate::engine::CoreRuntime`], the core performs no IO: it consumes
//! [`WatchSignal`]s and returns [`WatchCommand`]s for the async shell in
//! [`super::runtime`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::types::TriggerWhileRunningBehaviour;
use crate::watch::queue::TriggerQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchState {
    #[default]
    Idle,
    /// Initial full build.
    Building,
    /// Server up, bindings armed.
    Serving,
    Rebuilding,
    ShuttingDown,
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchState::Idle => "idle",
            WatchState::Building => "building",
            WatchState::Serving => "serving",
            WatchState::Rebuilding => "rebuilding",
            WatchState::ShuttingDown => "shutting down",
        };
        f.write_str(s)
    }
}

/// Inputs to the watch core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    Start,
    InitialBuildFinished { success: bool, failed: Vec<String> },
    /// Bindings matched by a debounced batch of file changes.
    BindingsTriggered(Vec<String>),
    RebuildFinished,
    ShutdownRequested,
    /// The shell has stopped the server and watcher.
    ShutdownComplete,
}

/// Work the shell should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    RunInitialBuild,
    /// Start the dev server and arm the watcher.
    StartServing,
    /// Rebuild these bindings (a coalesced batch).
    Rebuild(Vec<String>),
    /// The initial build failed; stop with an error naming the tasks.
    Abort { failed: Vec<String> },
    /// Stop the server and drop the watcher.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchStep {
    pub commands: Vec<WatchCommand>,
    pub keep_running: bool,
}

impl WatchStep {
    fn run(commands: Vec<WatchCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn stop(commands: Vec<WatchCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

#[derive(Debug)]
pub struct WatchCore {
    state: WatchState,
    queue: TriggerQueue,
}

impl WatchCore {
    pub fn new(behaviour: TriggerWhileRunningBehaviour, queue_length: usize) -> Self {
        Self {
            state: WatchState::Idle,
            queue: TriggerQueue::new(behaviour, queue_length),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Whether a rebuild batch is waiting.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn step(&mut self, signal: WatchSignal) -> WatchStep {
        let before = self.state;
        let step = self.transition(signal);
        if self.state != before {
            debug!(from = %before, to = %self.state, "watch state changed");
        }
        step
    }

    fn transition(&mut self, signal: WatchSignal) -> WatchStep {
        use WatchSignal as S;
        use WatchState as St;

        match (self.state, signal) {
            (_, S::ShutdownComplete) => {
                self.state = St::Idle;
                WatchStep::stop(Vec::new())
            }
            (St::ShuttingDown, _) => WatchStep::run(Vec::new()),
            (St::Idle, S::ShutdownRequested) => WatchStep::stop(Vec::new()),
            (_, S::ShutdownRequested) => {
                info!("shutting down");
                self.state = St::ShuttingDown;
                WatchStep::run(vec![WatchCommand::Shutdown])
            }

            (St::Idle, S::Start) => {
                self.state = St::Building;
                WatchStep::run(vec![WatchCommand::RunInitialBuild])
            }

            (St::Building, S::InitialBuildFinished { success: true, .. }) => {
                self.state = St::Serving;
                WatchStep::run(vec![WatchCommand::StartServing])
            }
            (St::Building, S::InitialBuildFinished { success: false, failed }) => {
                self.state = St::Idle;
                WatchStep::stop(vec![WatchCommand::Abort { failed }])
            }

            (St::Serving, S::BindingsTriggered(bindings)) if !bindings.is_empty() => {
                self.state = St::Rebuilding;
                WatchStep::run(vec![WatchCommand::Rebuild(bindings)])
            }
            (St::Rebuilding, S::BindingsTriggered(bindings)) => {
                self.queue.record_batch(bindings);
                WatchStep::run(Vec::new())
            }
            (St::Rebuilding, S::RebuildFinished) => match self.queue.pop_batch() {
                Some(batch) => WatchStep::run(vec![WatchCommand::Rebuild(batch)]),
                None => {
                    self.state = St::Serving;
                    WatchStep::run(Vec::new())
                }
            },

            (state, signal) => {
                if !matches!(signal, S::BindingsTriggered(_)) {
                    warn!(state = %state, ?signal, "ignoring signal in current state");
                }
                WatchStep::run(Vec::new())
            }
        }
    }
}
