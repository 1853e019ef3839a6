use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;

use sitepipe::engine::GraphRunner;
use sitepipe::errors::SitepipeError;
use sitepipe::mode::BuildMode;
use sitepipe::pipeline::{build_pipeline, watch_bindings};
use sitepipe::server::ReloadEvent;
use sitepipe::tasks::{TaskContext, TaskKind, TaskReport, Tool, ToolFuture, Toolbox};
use sitepipe::watch::{RebuildSummary, WatchEvent, WatchOptions, WatchRuntime, WatchState};
use sitepipe_test_utils::builders::{context_for, recording_toolbox};
use sitepipe_test_utils::tools::{ExecutionLog, RecordingTool};
use sitepipe_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn options() -> WatchOptions {
    WatchOptions {
        server: None,
        watch_files: false,
        ..WatchOptions::default()
    }
}

struct Harness {
    _dir: TempDir,
    tx: mpsc::Sender<WatchEvent>,
    summaries: mpsc::UnboundedReceiver<RebuildSummary>,
    reloads: tokio::sync::broadcast::Receiver<ReloadEvent>,
    state: tokio::sync::watch::Receiver<WatchState>,
    handle: JoinHandle<sitepipe::errors::Result<()>>,
}

impl Harness {
    fn start(toolbox: Toolbox) -> Self {
        Self::start_in(toolbox, BuildMode::Development)
    }

    fn start_in(toolbox: Toolbox, mode: BuildMode) -> Self {
        let dir = TempDir::new().unwrap();
        let runner = GraphRunner::new(context_for(dir.path(), mode));
        let (summary_tx, summaries) = mpsc::unbounded_channel();
        let runtime = WatchRuntime::new(
            runner,
            build_pipeline(&toolbox),
            watch_bindings(&toolbox, mode),
            options(),
        )
        .unwrap()
        .with_rebuild_observer(summary_tx);

        let tx = runtime.sender();
        let reloads = runtime.reload_handle().subscribe();
        let state = runtime.state_watcher();
        let handle = tokio::spawn(runtime.run());

        Self {
            _dir: dir,
            tx,
            summaries,
            reloads,
            state,
            handle,
        }
    }

    async fn wait_for_state(&mut self, wanted: WatchState) {
        with_timeout(self.state.wait_for(|s| *s == wanted))
            .await
            .unwrap();
    }

    async fn change(&self, paths: &[&str]) {
        self.tx
            .send(WatchEvent::PathsChanged(
                paths.iter().map(|p| p.to_string()).collect(),
            ))
            .await
            .unwrap();
    }

    async fn next_summary(&mut self) -> RebuildSummary {
        with_timeout(self.summaries.recv()).await.unwrap()
    }

    async fn shutdown(self) -> sitepipe::errors::Result<()> {
        self.tx.send(WatchEvent::ShutdownRequested).await.unwrap();
        with_timeout(self.handle).await.unwrap()
    }
}

#[tokio::test]
async fn initial_build_runs_the_whole_pipeline_then_serves() {
    init_tracing();
    let log = ExecutionLog::new();
    let mut harness = Harness::start(recording_toolbox(&log));

    harness.wait_for_state(WatchState::Serving).await;

    assert_eq!(log.finished().len(), TaskKind::ALL.len());
    assert_eq!(log.started()[0], "clean");
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn style_change_rebuilds_styles_and_injects_css() {
    init_tracing();
    let log = ExecutionLog::new();
    let mut harness = Harness::start(recording_toolbox(&log));
    harness.wait_for_state(WatchState::Serving).await;
    log.clear();

    harness.change(&["styles/main.css"]).await;
    let summary = harness.next_summary().await;

    assert_eq!(summary.bindings(), vec!["styles"]);
    assert!(summary.is_success());
    let mut started = log.started();
    started.sort();
    assert_eq!(started, vec!["compile-styles", "lint-styles"]);
    assert_eq!(harness.reloads.try_recv().unwrap(), ReloadEvent::Css);
    assert!(harness.reloads.try_recv().is_err());

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn template_change_reloads_the_page() {
    init_tracing();
    let log = ExecutionLog::new();
    let mut harness = Harness::start(recording_toolbox(&log));
    harness.wait_for_state(WatchState::Serving).await;
    log.clear();

    harness.change(&["pages/_header.njk"]).await;
    let summary = harness.next_summary().await;

    assert_eq!(summary.bindings(), vec!["templates"]);
    assert_eq!(log.started(), vec!["render-pages"]);
    assert_eq!(harness.reloads.try_recv().unwrap(), ReloadEvent::Full);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn script_change_rebundles_and_reloads_in_development() {
    init_tracing();
    let log = ExecutionLog::new();
    let mut harness = Harness::start(recording_toolbox(&log));
    harness.wait_for_state(WatchState::Serving).await;
    log.clear();

    harness.change(&["README.md"]).await;
    harness.change(&["js/main.js"]).await;
    let summary = harness.next_summary().await;

    assert_eq!(summary.bindings(), vec!["scripts"]);
    assert!(summary.is_success());
    let mut started = log.started();
    started.sort();
    assert_eq!(started, vec!["bundle-scripts", "lint-scripts"]);
    assert_eq!(harness.reloads.try_recv().unwrap(), ReloadEvent::Full);
    assert!(harness.reloads.try_recv().is_err());

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn script_change_only_lints_in_production() {
    init_tracing();
    let log = ExecutionLog::new();
    let mut harness = Harness::start_in(recording_toolbox(&log), BuildMode::Production);
    harness.wait_for_state(WatchState::Serving).await;
    log.clear();

    harness.change(&["js/main.js"]).await;
    let summary = harness.next_summary().await;

    assert_eq!(summary.bindings(), vec!["scripts"]);
    assert_eq!(log.started(), vec!["lint-scripts"]);
    assert!(harness.reloads.try_recv().is_err());

    harness.shutdown().await.unwrap();
}

/// Succeeds on the first run only.
struct FlakyTool {
    runs: AtomicUsize,
}

impl Tool for FlakyTool {
    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> ToolFuture<'a> {
        Box::pin(async move {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(TaskReport::default())
            } else {
                Err(anyhow!("template syntax error"))
            }
        })
    }
}

#[tokio::test]
async fn failed_rebuild_keeps_serving() {
    init_tracing();
    let log = ExecutionLog::new();
    let flaky = Arc::new(FlakyTool {
        runs: AtomicUsize::new(0),
    });
    let mut harness =
        Harness::start(recording_toolbox(&log).with_tool(TaskKind::RenderPages, flaky));
    harness.wait_for_state(WatchState::Serving).await;

    harness.change(&["pages/index.njk"]).await;
    let summary = harness.next_summary().await;
    assert!(!summary.is_success());
    assert_eq!(
        summary.report("templates").map(|r| r.failed_names()),
        Some(vec!["render-pages".to_string()])
    );
    assert!(harness.reloads.try_recv().is_err());

    harness.wait_for_state(WatchState::Serving).await;
    harness.change(&["assets/images/logo.png"]).await;
    let summary = harness.next_summary().await;
    assert!(summary.is_success());
    assert_eq!(harness.reloads.try_recv().unwrap(), ReloadEvent::Full);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn changes_during_a_rebuild_are_coalesced() {
    init_tracing();
    let log = ExecutionLog::new();
    let slow_styles = Arc::new(
        RecordingTool::new("compile-styles", &log).with_delay(Duration::from_millis(300)),
    );
    let mut harness =
        Harness::start(recording_toolbox(&log).with_tool(TaskKind::CompileStyles, slow_styles));
    harness.wait_for_state(WatchState::Serving).await;
    log.clear();

    harness.change(&["styles/main.css"]).await;
    harness.wait_for_state(WatchState::Rebuilding).await;
    harness.change(&["pages/index.njk"]).await;
    harness.change(&["assets/fonts/body.woff2", "pages/index.njk"]).await;

    let first = harness.next_summary().await;
    let second = harness.next_summary().await;

    assert_eq!(first.bindings(), vec!["styles"]);
    assert_eq!(second.bindings(), vec!["templates", "assets"]);
    assert_eq!(log.started().iter().filter(|n| *n == "render-pages").count(), 1);

    harness.wait_for_state(WatchState::Serving).await;
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_initial_build_stops_with_an_error() {
    init_tracing();
    let log = ExecutionLog::new();
    let broken_clean = Arc::new(RecordingTool::new("clean", &log).failing("permission denied"));
    let toolbox = recording_toolbox(&log).with_tool(TaskKind::Clean, broken_clean);
    let harness = Harness::start(toolbox);

    let result = with_timeout(harness.handle).await.unwrap();

    match result {
        Err(SitepipeError::PipelineFailed { failed }) => assert_eq!(failed, vec!["clean"]),
        other => panic!("expected PipelineFailed, got {other:?}"),
    }
    assert_eq!(log.started(), vec!["clean"]);
}

#[tokio::test]
async fn shutdown_returns_to_idle() {
    init_tracing();
    let log = ExecutionLog::new();
    let mut harness = Harness::start(recording_toolbox(&log));
    harness.wait_for_state(WatchState::Serving).await;

    let state = harness.state.clone();
    harness.shutdown().await.unwrap();

    assert_eq!(*state.borrow(), WatchState::Idle);
}

#[test]
fn options_follow_the_config() {
    let cfg = sitepipe_test_utils::builders::ConfigBuilder::new()
        .with_port(4000)
        .with_debounce_ms(250)
        .with_queue_length(2)
        .build();

    let options = WatchOptions::from_config(&cfg, Some(5000));

    let server = options.server.unwrap();
    assert_eq!(server.host, "127.0.0.1");
    assert_eq!(server.port, 5000);
    assert_eq!(options.debounce, Duration::from_millis(250));
    assert_eq!(options.queue_length, 2);
    assert!(options.watch_files);
}
