// src/tasks/pages.rs

//! Built-in page renderer backed by `tera`.
//!
//! Every `*.njk` file below `dev_pages` is loaded into one template set, so
//! pages can `{% extends %}`, `{% include %}` and `{% import %}` each other
//! by their path relative to `dev_pages`. Only top-level, non-partial
//! templates are rendered to `<name>.html` in the build root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tera::Tera;
use tracing::debug;

use crate::tasks::files::{collect_files, glob_set, is_partial, read_source, relative_str, write_file};
use crate::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*include\s+["']([^"']+)["']"#).expect("static regex")
});

static EXTENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%-?\s*extends\s").expect("static regex"));

static BLOCK_OR_SET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%-?\s*(block|endblock|set)\s.*?%\}").expect("static regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PageRenderer;

impl Tool for PageRenderer {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let pages = PathBuf::from(ctx.paths.dev_pages());
        let dest = PathBuf::from(ctx.paths.build());

        Box::pin(async move {
            tokio::task::spawn_blocking(move || render_tree(&pages, &dest))
                .await
                .context("page renderer worker panicked")?
        })
    }
}

fn render_tree(pages: &Path, dest: &Path) -> Result<TaskReport> {
    let tera = load_templates(pages)?;
    let mut report = TaskReport::default();

    for file in collect_files(pages, &glob_set(&["*.njk"])?)? {
        let Some(rel) = relative_str(pages, &file) else {
            continue;
        };
        if is_partial(&rel) {
            continue;
        }

        let html = render_with(&tera, &rel)?;
        let out_name = match rel.strip_suffix(".njk") {
            Some(stem) => format!("{stem}.html"),
            None => format!("{rel}.html"),
        };
        let out_path = dest.join(out_name);
        write_file(&out_path, html.as_bytes())?;
        debug!(template = %rel, output = ?out_path, "rendered page");
        report.outputs.push(out_path);
    }

    Ok(report)
}

/// Load every `*.njk` template below `root`, named by its `/`-separated
/// path relative to `root`.
///
/// Templates only see each other, so an include can never reach outside
/// `root`.
pub fn load_templates(root: &Path) -> Result<Tera> {
    let mut sources = Vec::new();
    for file in collect_files(root, &glob_set(&["**/*.njk"])?)? {
        if let Some(rel) = relative_str(root, &file) {
            let source = read_source(&file)?;
            sources.push((rel, hoist_layout_sets(&source)));
        }
    }

    check_include_cycles(&sources)?;

    let mut tera = Tera::default();
    tera.add_raw_templates(sources)
        .with_context(|| format!("loading templates from {:?}", root))?;
    Ok(tera)
}

/// Render the template at `rel` (relative to `root`).
pub fn render_template(root: &Path, rel: &str) -> Result<String> {
    let tera = load_templates(root)?;
    render_with(&tera, rel)
}

fn render_with(tera: &Tera, rel: &str) -> Result<String> {
    tera.render(rel, &tera::Context::new())
        .with_context(|| format!("template {rel}"))
}

/// Tera renders only the blocks of a template that extends a layout, so a
/// top-level `{% set %}` would be lost. Repeat those sets at the start of
/// every block instead.
fn hoist_layout_sets(source: &str) -> String {
    if !EXTENDS.is_match(source) {
        return source.to_string();
    }

    let mut depth = 0usize;
    let mut sets = String::new();
    for caps in BLOCK_OR_SET.captures_iter(source) {
        match &caps[1] {
            "block" => depth += 1,
            "endblock" => depth = depth.saturating_sub(1),
            _ if depth == 0 => sets.push_str(&caps[0]),
            _ => {}
        }
    }
    if sets.is_empty() {
        return source.to_string();
    }

    let mut out = String::with_capacity(source.len() + sets.len());
    let mut last = 0;
    for caps in BLOCK_OR_SET.captures_iter(source) {
        if &caps[1] != "block" {
            continue;
        }
        let tag = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&source[last..tag.end]);
        out.push_str(&sets);
        last = tag.end;
    }
    out.push_str(&source[last..]);
    out
}

/// Reject include chains that lead back to a template already on the chain.
/// Extends cycles are caught by tera itself.
fn check_include_cycles(sources: &[(String, String)]) -> Result<()> {
    let edges: HashMap<&str, Vec<&str>> = sources
        .iter()
        .map(|(name, body)| {
            let targets = INCLUDE
                .captures_iter(body)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect();
            (name.as_str(), targets)
        })
        .collect();

    let mut done: Vec<&str> = Vec::new();
    for (name, _) in sources {
        let mut chain = Vec::new();
        visit(name, &edges, &mut chain, &mut done)?;
    }
    Ok(())
}

fn visit<'s>(
    name: &'s str,
    edges: &HashMap<&'s str, Vec<&'s str>>,
    chain: &mut Vec<&'s str>,
    done: &mut Vec<&'s str>,
) -> Result<()> {
    if done.contains(&name) {
        return Ok(());
    }
    if chain.contains(&name) {
        chain.push(name);
        bail!("template {}: recursive include via {}", chain[0], chain.join(" -> "));
    }

    chain.push(name);
    for target in edges.get(name).into_iter().flatten() {
        visit(*target, edges, chain, done)?;
    }
    chain.pop();
    done.push(name);
    Ok(())
}
