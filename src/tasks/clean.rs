// src/tasks/clean.rs

use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use crate::tasks::files::remove_tree;
use crate::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

/// Deletes the whole build root.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanBuild;

impl Tool for CleanBuild {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let build = PathBuf::from(ctx.paths.build());
        Box::pin(async move {
            let target = build.clone();
            let removed = tokio::task::spawn_blocking(move || remove_tree(&target))
                .await
                .context("clean worker panicked")??;
            debug!(path = ?build, removed, "build root cleaned");
            Ok(TaskReport::default())
        })
    }
}
