// src/mode.rs

//! Build mode resolution.
//!
//! The mode is resolved exactly once per invocation (in [`crate::run`]) and
//! then passed by value to everything that needs it.

use std::fmt;

/// Environment variable that can select production mode without the flag.
pub const MODE_ENV_VAR: &str = "SITEPIPE_ENV";

/// Development vs production switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// The value exported to external tools as `NODE_ENV` / `SITEPIPE_ENV`.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    /// File-name suffix inserted before the extension of compiled outputs.
    pub fn output_suffix(self) -> &'static str {
        match self {
            BuildMode::Development => "",
            BuildMode::Production => ".min",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the build mode from the `--production` flag and an optional
/// environment override.
///
/// Production requires an explicit request; anything else (including an
/// unrecognised env value) is development.
pub fn resolve_mode(production_flag: bool, env_override: Option<&str>) -> BuildMode {
    let env_production = env_override
        .map(|v| v.trim().eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    if production_flag || env_production {
        BuildMode::Production
    } else {
        BuildMode::Development
    }
}

/// [`resolve_mode`] reading the override from [`MODE_ENV_VAR`].
pub fn resolve_mode_from_env(production_flag: bool) -> BuildMode {
    let env = std::env::var(MODE_ENV_VAR).ok();
    resolve_mode(production_flag, env.as_deref())
}
