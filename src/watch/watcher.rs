// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::tasks::files::relative_str;
use crate::watch::runtime::WatchEvent;

/// Keeps the debounced watcher alive. Dropping it stops file watching.
pub struct WatcherHandle {
    _inner: Debouncer<RecommendedWatcher>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send one [`WatchEvent::PathsChanged`] per
/// debounced batch, with paths relative to `root` using `/` separators.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    debounce: Duration,
    tx: mpsc::Sender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);
    let callback_root = root.clone();

    // Called on the debouncer's thread.
    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
        Ok(events) => {
            let mut paths: Vec<String> = events
                .iter()
                .filter_map(|event| relativize(&callback_root, &event.path))
                .collect();
            paths.sort();
            paths.dedup();
            if paths.is_empty() {
                return;
            }
            debug!(?paths, "debounced file changes");
            if tx.blocking_send(WatchEvent::PathsChanged(paths)).is_err() {
                debug!("watch loop gone; dropping file changes");
            }
        }
        Err(err) => warn!(error = %err, "file watch error"),
    })
    .context("creating file watcher")?;

    debouncer
        .watcher()
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "file watcher started");
    Ok(WatcherHandle { _inner: debouncer })
}

/// Relative path of `path` under `root`, retrying with canonical paths for
/// platforms that report a different absolute prefix (macOS `/private`).
fn relativize(root: &Path, path: &Path) -> Option<String> {
    if let Some(rel) = relative_str(root, path) {
        return Some(rel);
    }
    let canonical = path.canonicalize().ok()?;
    relative_str(root, &canonical)
}
