// src/watch/event_handler.rs

//! Turns batches of changed paths into triggered bindings.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::watch::hash::{ContentGate, compute_hash_for_paths};
use crate::watch::patterns::BindingProfile;

/// Matches changed paths against binding profiles, optionally skipping
/// bindings whose watched content is unchanged.
#[derive(Debug)]
pub struct TriggerFilter {
    /// Source root the profiles' patterns are relative to.
    root: PathBuf,
    profiles: Vec<BindingProfile>,
    gate: Option<ContentGate>,
}

impl TriggerFilter {
    pub fn new(root: impl Into<PathBuf>, profiles: Vec<BindingProfile>, use_hash: bool) -> Self {
        Self {
            root: root.into(),
            profiles,
            gate: use_hash.then(ContentGate::new),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record the current content of every binding as the baseline.
    pub fn prime(&mut self) {
        let Some(gate) = self.gate.as_mut() else {
            return;
        };
        for profile in &self.profiles {
            match binding_hash(&self.root, profile) {
                Ok(hash) => gate.prime(profile.name(), hash),
                Err(err) => warn!(binding = %profile.name(), error = %err, "hashing failed"),
            }
        }
    }

    /// Names of the bindings triggered by `rel_paths`, in profile order.
    pub fn bindings_for(&mut self, rel_paths: &[String]) -> Vec<String> {
        let mut triggered = Vec::new();

        for profile in &self.profiles {
            let Some(path) = rel_paths.iter().find(|p| profile.matches(p)) else {
                continue;
            };

            if let Some(gate) = self.gate.as_mut() {
                match binding_hash(&self.root, profile) {
                    Ok(hash) => {
                        if !gate.changed(profile.name(), hash) {
                            debug!(
                                binding = %profile.name(),
                                path = %path,
                                "content unchanged; not triggering"
                            );
                            continue;
                        }
                    }
                    Err(err) => {
                        // Hashing failed: fall back to triggering.
                        warn!(binding = %profile.name(), error = %err, "hashing failed");
                    }
                }
            }

            debug!(binding = %profile.name(), path = %path, "watch match -> triggering binding");
            triggered.push(profile.name().to_string());
        }

        triggered
    }
}

fn binding_hash(root: &Path, profile: &BindingProfile) -> Result<String> {
    let files = profile.collect_matching_files(root)?;
    compute_hash_for_paths(files)
}
