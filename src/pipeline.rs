// src/pipeline.rs

//! The site build pipeline and the watch bindings that rebuild parts of it.

use std::fmt;

use crate::dag::{TaskGraph, parallel, sequence};
use crate::mode::BuildMode;
use crate::paths::{ASSETS_DIR, PAGES_DIR, SCRIPTS_DIR, STYLES_DIR};
use crate::server::ReloadEvent;
use crate::tasks::{TaskKind, Toolbox};

/// Full build: clean first, then every producer and linter concurrently.
pub fn build_pipeline(toolbox: &Toolbox) -> TaskGraph {
    let leaf = |kind: TaskKind| TaskGraph::from(toolbox.task(kind));
    sequence([
        leaf(TaskKind::Clean),
        parallel([
            leaf(TaskKind::CopyAssets),
            leaf(TaskKind::CopyPages),
            leaf(TaskKind::BuildFeatureDetection),
            leaf(TaskKind::RenderPages),
            leaf(TaskKind::CompileStyles),
            leaf(TaskKind::BundleScripts),
            leaf(TaskKind::LintStyles),
            leaf(TaskKind::LintScripts),
        ]),
    ])
}

/// When a finished rebuild notifies connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadPolicy {
    Never,
    /// Full page reload once the whole graph succeeded.
    AfterSuccess,
    /// Publish `event` as soon as `task` succeeds, without waiting for the
    /// rest of the graph.
    OnTaskSuccess {
        task: &'static str,
        event: ReloadEvent,
    },
}

/// Maps a set of source patterns to the subgraph they rebuild.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub name: &'static str,
    /// Globs relative to the source root.
    pub patterns: Vec<String>,
    pub graph: TaskGraph,
    pub reload: ReloadPolicy,
}

impl fmt::Display for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] -> {}",
            self.name,
            self.patterns.join(", "),
            self.graph
        )
    }
}

/// The fixed set of watch bindings.
///
/// In development a script change also rebundles and reloads the page once
/// the bundle is written; production watch sessions only lint scripts.
pub fn watch_bindings(toolbox: &Toolbox, mode: BuildMode) -> Vec<WatchBinding> {
    let leaf = |kind: TaskKind| TaskGraph::from(toolbox.task(kind));
    let scripts = if mode.is_production() {
        WatchBinding {
            name: "scripts",
            patterns: vec![format!("{SCRIPTS_DIR}**/*.js")],
            graph: leaf(TaskKind::LintScripts),
            reload: ReloadPolicy::Never,
        }
    } else {
        WatchBinding {
            name: "scripts",
            patterns: vec![format!("{SCRIPTS_DIR}**/*.js")],
            graph: parallel([leaf(TaskKind::BundleScripts), leaf(TaskKind::LintScripts)]),
            reload: ReloadPolicy::OnTaskSuccess {
                task: TaskKind::BundleScripts.name(),
                event: ReloadEvent::Full,
            },
        }
    };

    vec![
        scripts,
        WatchBinding {
            name: "templates",
            patterns: vec![format!("{PAGES_DIR}**/*.njk")],
            graph: leaf(TaskKind::RenderPages),
            reload: ReloadPolicy::AfterSuccess,
        },
        WatchBinding {
            name: "styles",
            patterns: vec![format!("{STYLES_DIR}**/*.css")],
            graph: parallel([leaf(TaskKind::CompileStyles), leaf(TaskKind::LintStyles)]),
            reload: ReloadPolicy::OnTaskSuccess {
                task: TaskKind::CompileStyles.name(),
                event: ReloadEvent::Css,
            },
        },
        WatchBinding {
            name: "assets",
            patterns: vec![format!("{ASSETS_DIR}**/*.*")],
            graph: leaf(TaskKind::CopyAssets),
            reload: ReloadPolicy::AfterSuccess,
        },
    ]
}
