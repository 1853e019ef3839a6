// src/paths.rs

//! Input/output directory layout.
//!
//! Every directory a task reads or writes is derived from two roots by plain
//! string concatenation, so two `PathSet`s built from the same roots always
//! agree byte for byte.

use std::path::Path;

/// Source subtree holding page templates and static pages.
pub const PAGES_DIR: &str = "pages/";
/// Source subtree holding stylesheets.
pub const STYLES_DIR: &str = "styles/";
/// Source subtree holding scripts.
pub const SCRIPTS_DIR: &str = "js/";
/// Source subtree holding static assets (also the build subtree name).
pub const ASSETS_DIR: &str = "assets/";
/// Build subtree receiving compiled stylesheets.
pub const CSS_DIR: &str = "css/";

/// Names accepted by [`PathSet::lookup`], in declaration order.
pub const PATH_NAMES: &[&str] = &[
    "dev",
    "dev_pages",
    "dev_styles",
    "dev_scripts",
    "dev_assets",
    "build",
    "build_css",
    "build_js",
    "build_assets",
];

/// Read-only set of directories derived from a source root and a build root.
///
/// All values end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    dev: String,
    dev_pages: String,
    dev_styles: String,
    dev_scripts: String,
    dev_assets: String,
    build: String,
    build_css: String,
    build_js: String,
    build_assets: String,
}

impl PathSet {
    /// Derive the full layout from the two roots. Pure; performs no IO.
    pub fn derive(dev_root: &str, build_root: &str) -> Self {
        let dev = with_trailing_slash(dev_root);
        let build = with_trailing_slash(build_root);

        Self {
            dev_pages: format!("{dev}{PAGES_DIR}"),
            dev_styles: format!("{dev}{STYLES_DIR}"),
            dev_scripts: format!("{dev}{SCRIPTS_DIR}"),
            dev_assets: format!("{dev}{ASSETS_DIR}"),
            build_css: format!("{build}{CSS_DIR}"),
            build_js: format!("{build}{SCRIPTS_DIR}"),
            build_assets: format!("{build}{ASSETS_DIR}"),
            dev,
            build,
        }
    }

    /// Derive the layout with both roots resolved against `base` (unless they
    /// are already absolute).
    pub fn derive_in(base: &Path, dev_root: &str, build_root: &str) -> Self {
        Self::derive(&resolve_root(base, dev_root), &resolve_root(base, build_root))
    }

    pub fn dev(&self) -> &str {
        &self.dev
    }

    pub fn dev_pages(&self) -> &str {
        &self.dev_pages
    }

    pub fn dev_styles(&self) -> &str {
        &self.dev_styles
    }

    pub fn dev_scripts(&self) -> &str {
        &self.dev_scripts
    }

    pub fn dev_assets(&self) -> &str {
        &self.dev_assets
    }

    pub fn build(&self) -> &str {
        &self.build
    }

    pub fn build_css(&self) -> &str {
        &self.build_css
    }

    pub fn build_js(&self) -> &str {
        &self.build_js
    }

    pub fn build_assets(&self) -> &str {
        &self.build_assets
    }

    /// Look a directory up by its logical name (see [`PATH_NAMES`]).
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let value = match name {
            "dev" => &self.dev,
            "dev_pages" => &self.dev_pages,
            "dev_styles" => &self.dev_styles,
            "dev_scripts" => &self.dev_scripts,
            "dev_assets" => &self.dev_assets,
            "build" => &self.build,
            "build_css" => &self.build_css,
            "build_js" => &self.build_js,
            "build_assets" => &self.build_assets,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// `(name, directory)` pairs in [`PATH_NAMES`] order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        PATH_NAMES
            .iter()
            .filter_map(|name| self.lookup(name).map(|value| (*name, value)))
    }
}

fn with_trailing_slash(root: &str) -> String {
    if root.ends_with('/') {
        root.to_string()
    } else {
        format!("{root}/")
    }
}

fn resolve_root(base: &Path, root: &str) -> String {
    if Path::new(root).is_absolute() {
        return root.to_string();
    }

    let stripped = root.strip_prefix("./").unwrap_or(root);
    let joined = base.join(stripped);
    joined.to_string_lossy().replace('\\', "/")
}
