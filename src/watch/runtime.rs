// src/watch/runtime.rs

//! Async shell around [`WatchCore`]: runs builds, owns the dev server and
//! the file watcher, and publishes reload events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::dag::{RunReport, TaskGraph};
use crate::engine::{GraphRunner, PipelineEvent};
use crate::errors::{Result, SitepipeError};
use crate::pipeline::{ReloadPolicy, WatchBinding};
use crate::server::{DevServer, ReloadHandle};
use crate::types::TriggerWhileRunningBehaviour;
use crate::watch::event_handler::TriggerFilter;
use crate::watch::patterns::build_binding_profiles;
use crate::watch::scheduler::{WatchCommand, WatchCore, WatchSignal, WatchState};
use crate::watch::watcher::{WatcherHandle, spawn_watcher};

/// Events flowing into the watch loop.
#[derive(Debug)]
pub enum WatchEvent {
    /// Debounced changes, relative to the source root.
    PathsChanged(Vec<String>),
    InitialBuildFinished(std::result::Result<RunReport, String>),
    RebuildFinished(RebuildSummary),
    ShutdownRequested,
}

/// Outcome of one coalesced rebuild batch.
#[derive(Debug, Clone)]
pub struct RebuildSummary {
    /// Binding name and its report, in batch order. A binding whose graph
    /// could not run at all has no report.
    pub results: Vec<(String, Option<RunReport>)>,
}

impl RebuildSummary {
    pub fn bindings(&self) -> Vec<&str> {
        self.results.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|(_, report)| report.as_ref().is_some_and(RunReport::is_success))
    }

    pub fn report(&self, binding: &str) -> Option<&RunReport> {
        self.results
            .iter()
            .find(|(name, _)| name == binding)
            .and_then(|(_, report)| report.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// `None` runs watch mode without a dev server.
    pub server: Option<ServerOptions>,
    /// Whether to start the file watcher; tests feed paths through
    /// [`WatchRuntime::sender`] instead.
    pub watch_files: bool,
    pub debounce: Duration,
    pub behaviour: TriggerWhileRunningBehaviour,
    pub queue_length: usize,
    pub use_hash: bool,
}

impl WatchOptions {
    pub fn from_config(cfg: &ConfigFile, port_override: Option<u16>) -> Self {
        let server = cfg.server().enabled.then(|| ServerOptions {
            host: cfg.server().host.clone(),
            port: port_override.unwrap_or(cfg.server().port),
        });
        Self {
            server,
            watch_files: true,
            debounce: Duration::from_millis(cfg.watch().debounce_ms),
            behaviour: cfg.watch().triggered_while_running_behaviour,
            queue_length: cfg.watch().queue_length,
            use_hash: cfg.watch().use_hash,
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from_config(&ConfigFile::default(), None)
    }
}

pub struct WatchRuntime {
    core: WatchCore,
    runner: GraphRunner,
    pipeline: TaskGraph,
    bindings: Arc<HashMap<String, WatchBinding>>,
    filter: TriggerFilter,
    options: WatchOptions,
    reload: ReloadHandle,
    tx: mpsc::Sender<WatchEvent>,
    rx: mpsc::Receiver<WatchEvent>,
    state_tx: watch::Sender<WatchState>,
    rebuild_observer: Option<mpsc::UnboundedSender<RebuildSummary>>,
    server: Option<DevServer>,
    watcher: Option<WatcherHandle>,
}

impl std::fmt::Debug for WatchRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRuntime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl WatchRuntime {
    pub fn new(
        runner: GraphRunner,
        pipeline: TaskGraph,
        bindings: Vec<WatchBinding>,
        options: WatchOptions,
    ) -> Result<Self> {
        let profiles = build_binding_profiles(&bindings)?;
        let filter = TriggerFilter::new(runner.context().paths.dev(), profiles, options.use_hash);
        let bindings = bindings
            .into_iter()
            .map(|b| (b.name.to_string(), b))
            .collect();

        let (tx, rx) = mpsc::channel(64);
        let (state_tx, _state_rx) = watch::channel(WatchState::Idle);

        Ok(Self {
            core: WatchCore::new(options.behaviour, options.queue_length),
            runner,
            pipeline,
            bindings: Arc::new(bindings),
            filter,
            options,
            reload: ReloadHandle::new(),
            tx,
            rx,
            state_tx,
            rebuild_observer: None,
            server: None,
            watcher: None,
        })
    }

    /// Sender for injecting events (Ctrl-C handler, tests).
    pub fn sender(&self) -> mpsc::Sender<WatchEvent> {
        self.tx.clone()
    }

    /// Follows the current [`WatchState`].
    pub fn state_watcher(&self) -> watch::Receiver<WatchState> {
        self.state_tx.subscribe()
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    /// Receive a summary after every rebuild batch.
    pub fn with_rebuild_observer(mut self, observer: mpsc::UnboundedSender<RebuildSummary>) -> Self {
        self.rebuild_observer = Some(observer);
        self
    }

    /// Run until shutdown. Fails when the initial build fails.
    pub async fn run(mut self) -> Result<()> {
        let mut outcome = Ok(());
        let mut keep_running = self.apply(WatchSignal::Start, &mut outcome).await;

        while keep_running {
            let Some(event) = self.rx.recv().await else {
                info!("watch event channel closed; exiting");
                break;
            };

            let signal = match event {
                WatchEvent::PathsChanged(paths) => {
                    if self.core.state() != WatchState::Serving
                        && self.core.state() != WatchState::Rebuilding
                    {
                        debug!(?paths, state = %self.core.state(), "ignoring file changes");
                        continue;
                    }
                    let triggered = self.filter.bindings_for(&paths);
                    if triggered.is_empty() {
                        debug!(?paths, "changes matched no binding");
                        continue;
                    }
                    info!(?paths, bindings = ?triggered, "source changed");
                    WatchSignal::BindingsTriggered(triggered)
                }
                WatchEvent::InitialBuildFinished(result) => match result {
                    Ok(report) => WatchSignal::InitialBuildFinished {
                        success: report.is_success(),
                        failed: report.failed_names(),
                    },
                    Err(err) => {
                        error!(error = %err, "initial build could not run");
                        WatchSignal::InitialBuildFinished {
                            success: false,
                            failed: Vec::new(),
                        }
                    }
                },
                WatchEvent::RebuildFinished(summary) => {
                    if let Some(observer) = &self.rebuild_observer {
                        let _ = observer.send(summary);
                    }
                    WatchSignal::RebuildFinished
                }
                WatchEvent::ShutdownRequested => WatchSignal::ShutdownRequested,
            };

            keep_running = self.apply(signal, &mut outcome).await;
        }

        self.stop_services().await;
        self.publish_state();
        outcome
    }

    /// Feed `signal` to the core and execute the resulting commands.
    async fn apply(&mut self, signal: WatchSignal, outcome: &mut Result<()>) -> bool {
        let mut pending = vec![signal];
        let mut keep_running = true;

        while let Some(signal) = pending.pop() {
            let step = self.core.step(signal);
            self.publish_state();
            keep_running = step.keep_running;

            for command in step.commands {
                match command {
                    WatchCommand::RunInitialBuild => self.spawn_initial_build(),
                    WatchCommand::StartServing => {
                        if let Err(err) = self.start_services().await {
                            error!(error = %err, "could not start serving");
                            *outcome = Err(err);
                            pending.push(WatchSignal::ShutdownRequested);
                        }
                    }
                    WatchCommand::Rebuild(batch) => self.spawn_rebuild(batch),
                    WatchCommand::Abort { failed } => {
                        error!(?failed, "initial build failed; not serving");
                        *outcome = Err(SitepipeError::PipelineFailed { failed });
                    }
                    WatchCommand::Shutdown => {
                        self.stop_services().await;
                        pending.push(WatchSignal::ShutdownComplete);
                    }
                }
            }
        }

        keep_running
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.core.state());
    }

    fn spawn_initial_build(&self) {
        let runner = self.runner.clone();
        let pipeline = self.pipeline.clone();
        let tx = self.tx.clone();
        info!(mode = %runner.context().mode, "initial build started");

        tokio::spawn(async move {
            let result = runner.run(&pipeline).await.map_err(|e| e.to_string());
            if let Ok(report) = &result {
                log_report("initial build", report);
            }
            let _ = tx.send(WatchEvent::InitialBuildFinished(result)).await;
        });
    }

    async fn start_services(&mut self) -> Result<()> {
        if let Some(server) = &self.options.server {
            let dev_server = DevServer::start(
                self.runner.context().paths.build(),
                &server.host,
                server.port,
                self.reload.clone(),
            )
            .await?;
            self.server = Some(dev_server);
        }

        self.filter.prime();

        if self.options.watch_files {
            let root = self.filter.root().to_path_buf();
            let watcher = spawn_watcher(root, self.options.debounce, self.tx.clone())?;
            self.watcher = Some(watcher);
        }

        info!("watching for changes");
        Ok(())
    }

    async fn stop_services(&mut self) {
        if self.watcher.take().is_some() {
            debug!("file watcher dropped");
        }
        if let Some(server) = self.server.take() {
            server.stop().await;
        }
    }

    fn spawn_rebuild(&self, batch: Vec<String>) {
        let runner = self.runner.clone();
        let bindings = Arc::clone(&self.bindings);
        let reload = self.reload.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let runs = batch.into_iter().map(|name| {
                let runner = runner.clone();
                let reload = reload.clone();
                let binding = bindings.get(&name).cloned();
                async move {
                    let report = match binding {
                        Some(binding) => rebuild_binding(&runner, &binding, &reload).await,
                        None => {
                            warn!(binding = %name, "unknown binding; skipping");
                            None
                        }
                    };
                    (name, report)
                }
            });
            let results = futures::future::join_all(runs).await;
            let _ = tx
                .send(WatchEvent::RebuildFinished(RebuildSummary { results }))
                .await;
        });
    }
}

/// Run one binding's graph and publish its reload event.
async fn rebuild_binding(
    runner: &GraphRunner,
    binding: &WatchBinding,
    reload: &ReloadHandle,
) -> Option<RunReport> {
    info!(binding = %binding.name, graph = %binding.graph, "rebuilding");

    let (observer_tx, forwarder) = match &binding.reload {
        ReloadPolicy::OnTaskSuccess { task, event } => {
            let (obs_tx, mut obs_rx) = mpsc::unbounded_channel::<PipelineEvent>();
            let task = *task;
            let event = *event;
            let reload = reload.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(progress) = obs_rx.recv().await {
                    if let PipelineEvent::TaskFinished {
                        name,
                        success: true,
                    } = progress
                    {
                        if name == task {
                            reload.publish(event);
                        }
                    }
                }
            });
            (Some(obs_tx), Some(forwarder))
        }
        ReloadPolicy::Never | ReloadPolicy::AfterSuccess => (None, None),
    };

    let result = runner.run_observed(&binding.graph, observer_tx).await;
    if let Some(forwarder) = forwarder {
        // The observer sender was dropped with the run; drain what is left.
        let _ = forwarder.await;
    }

    match result {
        Ok(report) => {
            log_report(binding.name, &report);
            if report.is_success() {
                if binding.reload == ReloadPolicy::AfterSuccess {
                    reload.reload();
                }
            } else {
                warn!(
                    binding = %binding.name,
                    failed = ?report.failed_names(),
                    "rebuild failed; still serving previous output"
                );
            }
            Some(report)
        }
        Err(err) => {
            error!(binding = %binding.name, error = %err, "rebuild could not run");
            None
        }
    }
}

fn log_report(label: &str, report: &RunReport) {
    for result in &report.results {
        debug!(run = label, task = %result.name, status = %result.status, "task status");
    }
    if report.is_success() {
        info!(run = label, tasks = report.results.len(), "finished");
    } else {
        error!(run = label, failed = ?report.failed_names(), skipped = ?report.skipped(), "failed");
    }
}
