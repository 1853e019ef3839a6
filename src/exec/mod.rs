// src/exec/mod.rs

//! Task execution layer.
//!
//! Scheduled tasks are handed to an executor, which runs each task's
//! [`crate::tasks::Tool`] on its own Tokio task and reports back to the
//! runtime via [`crate::engine::RuntimeEvent::TaskCompleted`].
//!
//! - [`backend`] provides the [`ExecutorBackend`] trait and the production
//!   [`ToolExecutor`]; tests substitute a fake implementation.
//! - [`executor_loop`] owns the loop that receives scheduled tasks.
//! - [`task_runner`] runs a single task and converts its result.
//! - [`command`] is the external-command tool used for `[tools.*]` overrides.

pub mod backend;
pub mod command;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, ToolExecutor};
pub use command::CommandTool;
pub use executor_loop::spawn_executor;
