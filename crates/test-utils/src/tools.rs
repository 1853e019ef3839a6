//! Scripted [`Tool`] implementations for engine tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use sitepipe::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

/// Shared, ordered log of tool events ("start:x" / "end:x" or plain names).
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Names of tools that finished, in completion order.
    pub fn finished(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("end:").map(str::to_string))
            .collect()
    }

    /// Names of tools that started, in start order.
    pub fn started(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start:").map(str::to_string))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Records `start:<name>` and `end:<name>`, optionally sleeping in between,
/// then succeeds or fails as scripted.
#[derive(Debug, Clone)]
pub struct RecordingTool {
    name: String,
    log: ExecutionLog,
    delay: Duration,
    failure: Option<String>,
}

impl RecordingTool {
    pub fn new(name: impl Into<String>, log: &ExecutionLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

impl Tool for RecordingTool {
    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> ToolFuture<'a> {
        Box::pin(async move {
            self.log.push(format!("start:{}", self.name));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.log.push(format!("end:{}", self.name));
            match &self.failure {
                Some(message) => Err(anyhow!("{message}")),
                None => Ok(TaskReport::default()),
            }
        })
    }
}

/// A tool that panics; the executor must turn this into a task failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingTool;

impl Tool for PanickingTool {
    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> ToolFuture<'a> {
        Box::pin(async move { panic!("tool exploded") })
    }
}
