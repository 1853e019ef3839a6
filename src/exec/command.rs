// src/exec/command.rs

//! External command tool used for `[tools.<task>]` overrides.

use std::process::Stdio;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::{Captures, Regex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::mode::MODE_ENV_VAR;
use crate::tasks::{TaskContext, TaskKind, TaskReport, Tool, ToolFuture};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("static regex"));

/// Placeholder names other than the path names.
pub const MODE_PLACEHOLDER: &str = "mode";

/// Runs a shell command in place of a built-in tool.
#[derive(Debug, Clone)]
pub struct CommandTool {
    kind: TaskKind,
    cmd: String,
    production_cmd: Option<String>,
}

impl CommandTool {
    pub fn new(kind: TaskKind, cmd: String, production_cmd: Option<String>) -> Self {
        Self {
            kind,
            cmd,
            production_cmd,
        }
    }

    /// The command template for the context's mode.
    fn template(&self, ctx: &TaskContext) -> &str {
        match (&self.production_cmd, ctx.mode.is_production()) {
            (Some(cmd), true) => cmd,
            _ => &self.cmd,
        }
    }
}

/// Names of all placeholders in `template`.
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Substitute `{dev}`, `{build_css}`, `{mode}` and friends. Unknown
/// placeholders are left untouched (config validation rejects them).
pub fn expand(template: &str, ctx: &TaskContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            if name == MODE_PLACEHOLDER {
                return ctx.mode.as_str().to_string();
            }
            match ctx.paths.lookup(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

impl Tool for CommandTool {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let command_line = expand(self.template(ctx), ctx);
            run_command(self.kind, &command_line, ctx).await?;
            Ok(TaskReport::default())
        })
    }
}

async fn run_command(kind: TaskKind, command_line: &str, ctx: &TaskContext) -> Result<()> {
    info!(task = %kind, cmd = %command_line, "running external tool");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    };

    cmd.env("NODE_ENV", ctx.mode.as_str())
        .env(MODE_ENV_VAR, ctx.mode.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning external tool for '{kind}'"))?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(task = %kind, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(task = %kind, "{line}");
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for external tool of '{kind}'"))?;
    debug!(task = %kind, ?status, "external tool exited");

    if !status.success() {
        match status.code() {
            Some(code) => bail!("command `{command_line}` exited with code {code}"),
            None => bail!("command `{command_line}` was terminated by a signal"),
        }
    }
    Ok(())
}
