// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::TriggerWhileRunningBehaviour;

/// Top-level configuration as read from `Sitepipe.toml`.
///
/// ```toml
/// [paths]
/// dev = "./src/"
/// build = "./build/"
///
/// [server]
/// port = 3000
///
/// [watch]
/// debounce_ms = 100
///
/// [tools.compile-styles]
/// cmd = "sass {dev_styles}main.scss {build_css}main.css"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub watch: WatchSection,

    /// External command overrides, keyed by task name.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
}

/// Validated configuration (see `validate.rs` for the checks).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    paths: PathsSection,
    server: ServerSection,
    watch: WatchSection,
    tools: BTreeMap<String, ToolConfig>,
}

impl ConfigFile {
    /// Internal constructor used after validation has succeeded.
    pub(crate) fn new_unchecked(
        paths: PathsSection,
        server: ServerSection,
        watch: WatchSection,
        tools: BTreeMap<String, ToolConfig>,
    ) -> Self {
        Self {
            paths,
            server,
            watch,
            tools,
        }
    }

    pub fn paths(&self) -> &PathsSection {
        &self.paths
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    /// Tool overrides in name order.
    pub fn tools(&self) -> impl Iterator<Item = (&str, &ToolConfig)> {
        self.tools.iter().map(|(name, cfg)| (name.as_str(), cfg))
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        Self::new_unchecked(raw.paths, raw.server, raw.watch, raw.tools)
    }
}

/// `[paths]` section: the two roots everything else is derived from.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    #[serde(default = "default_dev_root")]
    pub dev: String,
    #[serde(default = "default_build_root")]
    pub build: String,
}

fn default_dev_root() -> String {
    "./src/".to_string()
}

fn default_build_root() -> String {
    "./build/".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            dev: default_dev_root(),
            build: default_build_root(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Watch mode without a server is useful behind another web server.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: true,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Quiet period that closes a batch of file events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// `"queue"` (default) or `"cancel"`.
    ///
    /// - `"queue"`: remember triggers and run them after the current rebuild.
    /// - `"cancel"`: drop older pending batches and keep only the latest.
    ///   The in-flight rebuild itself is never interrupted.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of pending batches.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Skip bindings whose watched files' content did not change.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_queue_length() -> usize {
    1
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
            use_hash: false,
        }
    }
}

/// `[tools.<task-name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Shell command run in place of the built-in tool.
    pub cmd: String,
    /// Used instead of `cmd` in production mode.
    #[serde(default)]
    pub production_cmd: Option<String>,
}
