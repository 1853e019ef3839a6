// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::pipeline::WatchBinding;
use crate::tasks::files::{collect_files, glob_set};

/// Compiled glob patterns of one watch binding.
///
/// Patterns are relative to the source root; the watcher passes paths such
/// as `"styles/main.css"` into [`BindingProfile::matches`].
#[derive(Clone)]
pub struct BindingProfile {
    name: String,
    watch_set: GlobSet,
}

impl fmt::Debug for BindingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingProfile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl BindingProfile {
    pub fn new(name: impl Into<String>, patterns: &[String]) -> Result<Self> {
        let name = name.into();
        let patterns: Vec<&str> = patterns.iter().map(String::as_str).collect();
        let watch_set = glob_set(&patterns)
            .with_context(|| format!("building watch globset for binding {name}"))?;
        Ok(Self { name, watch_set })
    }

    pub fn from_binding(binding: &WatchBinding) -> Result<Self> {
        Self::new(binding.name, &binding.patterns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a source-root-relative path belongs to this binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.watch_set.is_match(rel_path)
    }

    /// Every file under `root` this binding watches, sorted.
    pub fn collect_matching_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        collect_files(root, &self.watch_set)
    }
}

/// Compile a profile for every binding.
pub fn build_binding_profiles(bindings: &[WatchBinding]) -> Result<Vec<BindingProfile>> {
    bindings.iter().map(BindingProfile::from_binding).collect()
}
