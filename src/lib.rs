// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod mode;
pub mod paths;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, default_config_path, load_or_default};
use crate::dag::{DagGraph, RunReport, TaskGraph};
use crate::engine::GraphRunner;
use crate::mode::{BuildMode, resolve_mode_from_env};
use crate::paths::PathSet;
use crate::pipeline::{WatchBinding, build_pipeline, watch_bindings};
use crate::tasks::{TaskContext, Toolbox};
use crate::watch::{WatchEvent, WatchOptions, WatchRuntime};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and mode resolution
/// - the directory layout and toolbox
/// - either a single build, or build + serve + watch
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.is_some();
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_or_default(&config_path, explicit)?;

    let mode = resolve_mode_from_env(args.production);
    let paths = PathSet::derive_in(
        &config_root_dir(&config_path),
        &cfg.paths().dev,
        &cfg.paths().build,
    );
    let toolbox = Toolbox::from_config(&cfg);
    let pipeline = build_pipeline(&toolbox);
    let bindings = watch_bindings(&toolbox, mode);

    if args.dry_run {
        print_dry_run(&cfg, mode, &paths, &pipeline, &bindings)?;
        return Ok(());
    }

    let runner = GraphRunner::new(TaskContext::new(paths, mode));

    match args.command {
        Some(Command::Build) => {
            let report = build_once(&runner, &pipeline).await?;
            info!(run_id = report.run_id, tasks = report.results.len(), "build succeeded");
            Ok(())
        }
        None => {
            let options = WatchOptions::from_config(&cfg, args.port);
            let runtime = WatchRuntime::new(runner, pipeline, bindings, options)?;

            // Ctrl-C → graceful shutdown.
            let tx = runtime.sender();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                let _ = tx.send(WatchEvent::ShutdownRequested).await;
            });

            runtime.run().await?;
            Ok(())
        }
    }
}

/// Run the full pipeline once. Fails with
/// [`errors::SitepipeError::PipelineFailed`] when a fatal task failed.
pub async fn build_once(runner: &GraphRunner, pipeline: &TaskGraph) -> errors::Result<RunReport> {
    info!(mode = %runner.context().mode, "build started");
    let report = runner.run(pipeline).await?;
    for result in &report.results {
        debug!(task = %result.name, status = %result.status, "task status");
    }
    report.into_result()
}

/// Directory relative `[paths]` roots are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "site/Sitepipe.toml"),
///   we use that directory.
/// - If it's just a bare filename, we fall back to the current directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print the resolved layout, pipeline and bindings without running anything.
fn print_dry_run(
    cfg: &ConfigFile,
    mode: BuildMode,
    paths: &PathSet,
    pipeline: &TaskGraph,
    bindings: &[WatchBinding],
) -> Result<()> {
    // Lowering validates the graph the same way a real run would.
    let dag = DagGraph::lower(pipeline)?;

    println!("sitepipe dry-run");
    println!("  mode = {mode}");
    println!();

    println!("paths:");
    for (name, value) in paths.entries() {
        println!("  {name:<13} {value}");
    }
    println!();

    println!("pipeline ({} tasks):", dag.len());
    println!("  {pipeline}");
    for (name, tool) in cfg.tools() {
        let cmd = match (&tool.production_cmd, mode.is_production()) {
            (Some(prod), true) => prod,
            _ => &tool.cmd,
        };
        println!("  {name}: {cmd}");
    }
    println!();

    println!("watch bindings:");
    for binding in bindings {
        println!("  {binding}");
    }
    if cfg.server().enabled {
        println!();
        println!("server: {}:{}", cfg.server().host, cfg.server().port);
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
