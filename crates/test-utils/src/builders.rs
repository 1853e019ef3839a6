use std::fs;
use std::path::Path;
use std::sync::Arc;

use sitepipe::config::{ConfigFile, RawConfigFile, ToolConfig};
use sitepipe::dag::TaskGraph;
use sitepipe::errors::Result;
use sitepipe::mode::BuildMode;
use sitepipe::paths::PathSet;
use sitepipe::tasks::{Task, TaskContext, TaskKind, Toolbox};
use sitepipe::types::FailurePolicy;

use crate::tools::{ExecutionLog, RecordingTool};

/// Leaf backed by a [`RecordingTool`] with the `Fatal` policy.
pub fn leaf(name: &str, log: &ExecutionLog) -> TaskGraph {
    TaskGraph::from(Task::new(
        name,
        FailurePolicy::Fatal,
        Arc::new(RecordingTool::new(name, log)),
    ))
}

/// Leaf that always fails with `"<name> failed"`.
pub fn failing_leaf(name: &str, log: &ExecutionLog) -> TaskGraph {
    TaskGraph::from(Task::new(
        name,
        FailurePolicy::Fatal,
        Arc::new(RecordingTool::new(name, log).failing(format!("{name} failed"))),
    ))
}

/// Leaf that fails but only counts as a diagnostic.
pub fn failing_diagnostic_leaf(name: &str, log: &ExecutionLog) -> TaskGraph {
    TaskGraph::from(Task::new(
        name,
        FailurePolicy::DiagnosticOnly,
        Arc::new(RecordingTool::new(name, log).failing(format!("{name} reported problems"))),
    ))
}

/// Toolbox where every task kind records into `log` instead of doing work.
pub fn recording_toolbox(log: &ExecutionLog) -> Toolbox {
    TaskKind::ALL.into_iter().fold(Toolbox::builtin(), |toolbox, kind| {
        toolbox.with_tool(kind, Arc::new(RecordingTool::new(kind.name(), log)))
    })
}

/// Context rooted at `<root>/src/` and `<root>/build/`.
pub fn context_for(root: &Path, mode: BuildMode) -> TaskContext {
    let dev = format!("{}/src/", root.display());
    let build = format!("{}/build/", root.display());
    TaskContext::new(PathSet::derive(&dev, &build), mode)
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// A small but complete source tree under `root/src/`.
pub fn write_sample_site(root: &Path) {
    write_file(
        root,
        "src/pages/index.njk",
        "{# landing page #}\n<!doctype html>\n<html>\n<head><link rel=\"stylesheet\" href=\"css/main.css\"></head>\n<body>\n{% include \"_header.njk\" %}\n<main>Hello</main>\n</body>\n</html>\n",
    );
    write_file(root, "src/pages/_header.njk", "<header>Site</header>");
    write_file(
        root,
        "src/pages/about.html",
        "<!doctype html>\n<html><body><p>About</p></body></html>\n",
    );
    write_file(
        root,
        "src/styles/main.css",
        "@import \"_tokens.css\";\n\n.layout {\n  display: flex;\n  color: var(--ink);\n}\n\n.card {\n  user-select: none;\n}\n",
    );
    write_file(root, "src/styles/_tokens.css", ":root {\n  --ink: #222;\n}\n");
    write_file(
        root,
        "src/js/main.js",
        "/* entry */\nconst items = [1, 2, 3];\nconsole.log(items);\n\nfunction total(xs) {\n  return xs.reduce((a, b) => a + b, 0);\n}\nfetch('/api').then(() => total(items));\n",
    );
    write_file(root, "src/assets/images/logo.png", [0x89, b'P', b'N', b'G', 0, 1, 2, 3]);
    write_file(root, "src/assets/fonts/body.woff2", b"wOF2fake");
}

/// Builder for configuration used in tests.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_tool(mut self, name: &str, cmd: &str) -> Self {
        self.config.tools.insert(
            name.to_string(),
            ToolConfig {
                cmd: cmd.to_string(),
                production_cmd: None,
            },
        );
        self
    }

    pub fn with_production_tool(mut self, name: &str, cmd: &str, production_cmd: &str) -> Self {
        self.config.tools.insert(
            name.to_string(),
            ToolConfig {
                cmd: cmd.to_string(),
                production_cmd: Some(production_cmd.to_string()),
            },
        );
        self
    }

    pub fn with_roots(mut self, dev: &str, build: &str) -> Self {
        self.config.paths.dev = dev.to_string();
        self.config.paths.build = build.to_string();
        self
    }

    pub fn with_queue_length(mut self, len: usize) -> Self {
        self.config.watch.queue_length = len;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
