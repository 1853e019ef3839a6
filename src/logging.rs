// src/logging.rs

//! Logging setup for `sitepipe` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen in this order:
//! 1. `--log-level` CLI flag: one level for sitepipe, dependencies at `warn`
//! 2. `SITEPIPE_LOG`, with full `EnvFilter` directive syntax
//!    (e.g. `"debug"` or `"sitepipe::watch=trace,info"`)
//! 3. `info`
//!
//! Logs go to STDERR; tool output and the dry-run listing use STDOUT.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when `--log-level` is absent.
pub const LOG_ENV_VAR: &str = "SITEPIPE_LOG";

/// Install the global subscriber. Call once, from `main`.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(cli_directives(level))
            .context("building log filter from --log-level")?,
        None => EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

/// Filter directives for a `--log-level` value. Server internals stay quiet
/// unless tracing everything.
pub fn cli_directives(level: LogLevel) -> String {
    let name = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => return "trace".to_string(),
    };
    format!("warn,sitepipe={name}")
}
