// src/tasks/copy.rs

use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::paths::PathSet;
use crate::tasks::files::{collect_files, glob_set, relative_str};
use crate::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

/// Copies every file of a source subtree that matches `pattern` into a
/// destination directory, preserving the relative layout.
#[derive(Clone, Copy)]
pub struct CopyTree {
    source: fn(&PathSet) -> &str,
    dest: fn(&PathSet) -> &str,
    pattern: &'static str,
}

impl fmt::Debug for CopyTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyTree")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl CopyTree {
    /// `dev_assets/**/*.*` -> `build_assets/`.
    pub fn assets() -> Self {
        Self {
            source: PathSet::dev_assets,
            dest: PathSet::build_assets,
            pattern: "**/*.*",
        }
    }

    /// `dev_pages/*.html` -> build root.
    pub fn pages() -> Self {
        Self {
            source: PathSet::dev_pages,
            dest: PathSet::build,
            pattern: "*.html",
        }
    }
}

impl Tool for CopyTree {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let source = PathBuf::from((self.source)(&ctx.paths));
        let dest = PathBuf::from((self.dest)(&ctx.paths));
        let pattern = self.pattern;

        Box::pin(async move {
            tokio::task::spawn_blocking(move || copy_matching(source, dest, pattern))
                .await
                .context("copy worker panicked")?
        })
    }
}

fn copy_matching(source: PathBuf, dest: PathBuf, pattern: &str) -> Result<TaskReport> {
    let patterns = glob_set(&[pattern])?;
    let mut report = TaskReport::default();

    for file in collect_files(&source, &patterns)? {
        let Some(rel) = relative_str(&source, &file) else {
            continue;
        };
        let target = dest.join(&rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        fs::copy(&file, &target)
            .with_context(|| format!("copying {:?} to {:?}", file, target))?;
        debug!(from = ?file, to = ?target, "copied");
        report.outputs.push(target);
    }

    Ok(report)
}
