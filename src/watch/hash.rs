// src/watch/hash.rs

//! Content hashing used to skip bindings whose files did not really change.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Deterministic hash over the names and contents of `paths`.
///
/// Order of `paths` does not matter. Names are included so that renaming a
/// file changes the digest.
pub fn compute_hash_for_paths<I, P>(paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut hasher = Hasher::new();

    let mut paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
    paths.sort();

    for path in paths {
        if path.is_file() {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(compute_file_hash(&path)?.as_bytes());
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, "computed aggregate hash");
    Ok(hash)
}

/// Remembers the last digest seen per binding.
#[derive(Debug, Default)]
pub struct ContentGate {
    hashes: HashMap<String, String>,
}

impl ContentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash` as the baseline for `binding` without deciding anything.
    pub fn prime(&mut self, binding: &str, hash: String) {
        self.hashes.insert(binding.to_string(), hash);
    }

    /// Store `hash` and report whether it differs from the previous one.
    /// A binding without a baseline always counts as changed.
    pub fn changed(&mut self, binding: &str, hash: String) -> bool {
        match self.hashes.insert(binding.to_string(), hash) {
            Some(previous) => self.hashes.get(binding) != Some(&previous),
            None => true,
        }
    }

    pub fn last_hash(&self, binding: &str) -> Option<&str> {
        self.hashes.get(binding).map(String::as_str)
    }
}
