// src/watch/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::types::TriggerWhileRunningBehaviour;

/// Batches of bindings triggered while a rebuild is already running.
///
/// Semantics:
/// - Each entry is a *batch* of binding names to rebuild together once the
///   current rebuild finishes.
/// - `max_batches` (`queue_length`) bounds how many batches are remembered.
///   When full, new triggers are merged into the newest batch, so with the
///   default of 1 everything that arrives during a rebuild coalesces into a
///   single follow-up rebuild.
/// - In `Cancel` mode there is a single pending batch. A new trigger
///   supersedes the queued trigger of the same binding, moving it to the
///   back; other bindings stay queued.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_batches: usize,
    batches: VecDeque<Vec<String>>,
}

impl TriggerQueue {
    /// `max_batches` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_batches: usize) -> Self {
        Self {
            behaviour,
            max_batches: max_batches.max(1),
            batches: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn behaviour(&self) -> TriggerWhileRunningBehaviour {
        self.behaviour
    }

    /// Record bindings triggered while a rebuild is in progress.
    pub fn record_batch(&mut self, bindings: Vec<String>) {
        if bindings.is_empty() {
            return;
        }

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                if self.batches.len() < self.max_batches {
                    debug!(?bindings, "queued new batch (queue mode)");
                    self.batches.push_back(dedup(bindings));
                } else if let Some(last) = self.batches.back_mut() {
                    warn!(
                        max_batches = self.max_batches,
                        ?bindings,
                        "queue full; merging into last queued batch"
                    );
                    for binding in bindings {
                        if !last.contains(&binding) {
                            last.push(binding);
                        }
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                let latest = dedup(bindings);
                if self.batches.is_empty() {
                    debug!(bindings = ?latest, "queued new batch (cancel mode)");
                    self.batches.push_back(latest);
                    return;
                }
                let Some(pending) = self.batches.front_mut() else {
                    return;
                };

                let superseded: Vec<&String> =
                    latest.iter().filter(|b| pending.contains(*b)).collect();
                if !superseded.is_empty() {
                    warn!(?superseded, "dropping queued trigger superseded by a newer one (cancel mode)");
                }
                pending.retain(|b| !latest.contains(b));
                pending.extend(latest);
            }
        }
    }

    /// Take the oldest pending batch.
    pub fn pop_batch(&mut self) -> Option<Vec<String>> {
        self.batches.pop_front()
    }
}

fn dedup(bindings: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(bindings.len());
    for binding in bindings {
        if !out.contains(&binding) {
            out.push(binding);
        }
    }
    out
}
