use std::str::FromStr;

use serde::Deserialize;

/// Behaviour when a watch binding fires while a rebuild is already running.
///
/// - `Queue`: remember the trigger and rebuild once the current rebuild
///   finishes; triggers arriving in the meantime are merged into the same
///   pending batch (default behaviour).
/// - `Cancel`: keep one pending batch in which a newer trigger of a binding
///   replaces its older one. Nothing queued for other bindings is dropped,
///   and the rebuild that is already running is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "cancel" => Ok(TriggerWhileRunningBehaviour::Cancel),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}

/// How a leaf task's failure affects the graph it runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Failure fails the task's dependents and the whole run.
    #[default]
    Fatal,
    /// Failure is reported but neither blocks dependents nor fails the run
    /// (linters).
    DiagnosticOnly,
}
