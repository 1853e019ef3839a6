// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SitepipeError};
use crate::exec::command::{MODE_PLACEHOLDER, placeholders};
use crate::paths::PATH_NAMES;
use crate::tasks::TaskKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.paths, raw.server, raw.watch, raw.tools,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_paths(cfg)?;
    validate_server(cfg)?;
    validate_watch(cfg)?;
    validate_tools(cfg)?;
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.paths.dev.trim().is_empty() || cfg.paths.build.trim().is_empty() {
        return Err(SitepipeError::ConfigError(
            "[paths].dev and [paths].build must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(SitepipeError::ConfigError(
            "[server].port must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    // triggered_while_running_behaviour is strongly typed and validated
    // during deserialization.
    if cfg.watch.queue_length == 0 {
        return Err(SitepipeError::ConfigError(
            "[watch].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.watch.debounce_ms == 0 {
        return Err(SitepipeError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tools(cfg: &RawConfigFile) -> Result<()> {
    for (name, tool) in cfg.tools.iter() {
        if TaskKind::from_name(name).is_none() {
            return Err(SitepipeError::UnknownTask(format!(
                "[tools.{name}] does not name a pipeline task"
            )));
        }

        let templates = std::iter::once(("cmd", &tool.cmd))
            .chain(tool.production_cmd.iter().map(|c| ("production_cmd", c)));
        for (field, template) in templates {
            if template.trim().is_empty() {
                return Err(SitepipeError::ConfigError(format!(
                    "[tools.{name}].{field} must not be empty"
                )));
            }
            for placeholder in placeholders(template) {
                if placeholder != MODE_PLACEHOLDER && !PATH_NAMES.contains(&placeholder) {
                    return Err(SitepipeError::ConfigError(format!(
                        "[tools.{name}].{field} uses unknown placeholder '{{{placeholder}}}'"
                    )));
                }
            }
        }
    }
    Ok(())
}
