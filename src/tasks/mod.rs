// src/tasks/mod.rs

//! Leaf tasks: one unit of work wrapping exactly one transformation.
//!
//! - [`Tool`] is the execution seam. Every leaf holds an `Arc<dyn Tool>`;
//!   the built-in implementations live in the submodules and an external
//!   shell command ([`crate::exec::CommandTool`]) can replace any of them.
//! - [`Toolbox`] decides which implementation backs each [`TaskKind`].
//! - Tools receive a [`TaskContext`] carrying the [`PathSet`] and the
//!   [`BuildMode`]; they keep no state between runs.

pub mod clean;
pub mod copy;
pub mod features;
pub mod files;
pub mod lint;
pub mod pages;
pub mod scripts;
pub mod styles;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;

use crate::config::ConfigFile;
use crate::exec::CommandTool;
use crate::mode::BuildMode;
use crate::paths::PathSet;
use crate::types::FailurePolicy;

/// The fixed set of leaf operations known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    Clean,
    CopyAssets,
    CopyPages,
    CompileStyles,
    LintStyles,
    BundleScripts,
    LintScripts,
    RenderPages,
    BuildFeatureDetection,
}

impl TaskKind {
    pub const ALL: [TaskKind; 9] = [
        TaskKind::Clean,
        TaskKind::CopyAssets,
        TaskKind::CopyPages,
        TaskKind::CompileStyles,
        TaskKind::LintStyles,
        TaskKind::BundleScripts,
        TaskKind::LintScripts,
        TaskKind::RenderPages,
        TaskKind::BuildFeatureDetection,
    ];

    /// Name used in logs, reports and `[tools.<name>]` config sections.
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Clean => "clean",
            TaskKind::CopyAssets => "copy-assets",
            TaskKind::CopyPages => "copy-pages",
            TaskKind::CompileStyles => "compile-styles",
            TaskKind::LintStyles => "lint-styles",
            TaskKind::BundleScripts => "bundle-scripts",
            TaskKind::LintScripts => "lint-scripts",
            TaskKind::RenderPages => "render-pages",
            TaskKind::BuildFeatureDetection => "build-feature-detection",
        }
    }

    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            TaskKind::LintStyles | TaskKind::LintScripts => FailurePolicy::DiagnosticOnly,
            _ => FailurePolicy::Fatal,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s.trim()).ok_or_else(|| format!("unknown task: {s}"))
    }
}

/// Everything a tool may read: where things live and which mode we build in.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub paths: PathSet,
    pub mode: BuildMode,
}

impl TaskContext {
    pub fn new(paths: PathSet, mode: BuildMode) -> Self {
        Self { paths, mode }
    }
}

/// A lint finding (or any other non-fatal remark) produced by a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: usize,
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.path.display(),
            self.line,
            self.message,
            self.rule
        )
    }
}

/// What a tool produced on success.
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    pub outputs: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Boxed future returned by [`Tool::run`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>>;

/// A single external (or built-in) transformation.
pub trait Tool: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a>;
}

/// A leaf of the task graph: a named tool invocation with a failure policy.
#[derive(Clone)]
pub struct Task {
    name: String,
    policy: FailurePolicy,
    tool: Arc<dyn Tool>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(name: impl Into<String>, policy: FailurePolicy, tool: Arc<dyn Tool>) -> Self {
        Self {
            name: name.into(),
            policy,
            tool,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }
}

/// Maps every [`TaskKind`] to the tool that implements it.
#[derive(Clone)]
pub struct Toolbox {
    tools: HashMap<TaskKind, Arc<dyn Tool>>,
}

impl fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.tools.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("Toolbox").field("tools", &kinds).finish()
    }
}

impl Toolbox {
    /// Toolbox backed entirely by the built-in implementations.
    pub fn builtin() -> Self {
        let mut tools: HashMap<TaskKind, Arc<dyn Tool>> = HashMap::new();
        for kind in TaskKind::ALL {
            tools.insert(kind, builtin_tool(kind));
        }
        Self { tools }
    }

    /// Built-in tools, replaced by `[tools.<name>]` commands where configured.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut toolbox = Self::builtin();
        for (name, tool_cfg) in cfg.tools() {
            // Tool names were checked during config validation.
            if let Some(kind) = TaskKind::from_name(name) {
                let command = CommandTool::new(
                    kind,
                    tool_cfg.cmd.clone(),
                    tool_cfg.production_cmd.clone(),
                );
                toolbox.tools.insert(kind, Arc::new(command));
            }
        }
        toolbox
    }

    /// Replace the implementation behind one task kind.
    pub fn with_tool(mut self, kind: TaskKind, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(kind, tool);
        self
    }

    /// A leaf task for `kind`.
    pub fn task(&self, kind: TaskKind) -> Task {
        let tool = self
            .tools
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| builtin_tool(kind));
        Task::new(kind.name(), kind.failure_policy(), tool)
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_tool(kind: TaskKind) -> Arc<dyn Tool> {
    match kind {
        TaskKind::Clean => Arc::new(clean::CleanBuild),
        TaskKind::CopyAssets => Arc::new(copy::CopyTree::assets()),
        TaskKind::CopyPages => Arc::new(copy::CopyTree::pages()),
        TaskKind::CompileStyles => Arc::new(styles::StyleCompiler),
        TaskKind::LintStyles => Arc::new(lint::Linter::styles()),
        TaskKind::BundleScripts => Arc::new(scripts::ScriptBundler::default()),
        TaskKind::LintScripts => Arc::new(lint::Linter::scripts()),
        TaskKind::RenderPages => Arc::new(pages::PageRenderer),
        TaskKind::BuildFeatureDetection => Arc::new(features::FeatureDetection),
    }
}
