// src/dag/report.rs

use std::fmt;

use crate::errors::{Result, SitepipeError};

/// Final status of one task in a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    /// A diagnostic-only task failed; the run was not affected.
    Warned(String),
    Failed(String),
    Skipped,
}

impl TaskStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Succeeded => f.write_str("succeeded"),
            TaskStatus::Warned(msg) => write!(f, "warned: {msg}"),
            TaskStatus::Failed(msg) => write!(f, "failed: {msg}"),
            TaskStatus::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub name: String,
    pub status: TaskStatus,
}

/// Aggregate outcome of one run of a task graph, in node order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    pub results: Vec<TaskResult>,
}

impl RunReport {
    /// True when no fatal task failed. Skipped tasks only occur after a
    /// failure, so they need no separate check.
    pub fn is_success(&self) -> bool {
        !self.results.iter().any(|r| r.status.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }

    pub fn failed_names(&self) -> Vec<String> {
        self.failures().map(|r| r.name.clone()).collect()
    }

    /// Status of the first node named `name`.
    pub fn status_of(&self, name: &str) -> Option<&TaskStatus> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.status)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.status == TaskStatus::Skipped)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// `Ok(self)` on success, otherwise a [`SitepipeError::PipelineFailed`]
    /// naming every failed task.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SitepipeError::PipelineFailed {
                failed: self.failed_names(),
            })
        }
    }
}
