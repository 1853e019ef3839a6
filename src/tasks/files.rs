// src/tasks/files.rs

//! Small filesystem helpers shared by the built-in tools.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Build a `GlobSet` in which `*` never crosses a `/`.
pub fn glob_set(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// All files below `root` whose root-relative path matches `patterns`,
/// sorted so that callers see a stable order.
///
/// A missing `root` yields an empty list.
pub fn collect_files(root: &Path, patterns: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).with_context(|| format!("reading dir {:?}", dir))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                if let Some(rel) = relative_str(root, &path) {
                    if patterns.is_match(&rel) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
    }
    fs::write(path, contents).with_context(|| format!("writing file {:?}", path))
}

/// Read a UTF-8 source file.
pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
}

/// Remove a directory tree; a tree that does not exist counts as removed.
pub fn remove_tree(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("removing {:?}", path)),
    }
}

/// Insert `suffix` before the extension: `main.css` + `.min` -> `main.min.css`.
pub fn with_suffix(rel: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return rel.to_string();
    }
    let file_start = rel.rfind('/').map(|i| i + 1).unwrap_or(0);
    match rel[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let split = file_start + dot;
            format!("{}{}{}", &rel[..split], suffix, &rel[split..])
        }
        _ => format!("{rel}{suffix}"),
    }
}

/// Final path component of a `/`-separated relative path.
pub fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Whether a relative path names a partial (`_`-prefixed file).
pub fn is_partial(rel: &str) -> bool {
    file_name(rel).starts_with('_')
}
