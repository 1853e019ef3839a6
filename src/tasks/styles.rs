// src/tasks/styles.rs

//! Built-in stylesheet compiler backed by `lightningcss`.
//!
//! Every non-partial `*.css` file under `dev_styles` is an entry point. Its
//! `@import`s are inlined by the lightningcss bundler, so partials
//! (`_*.css`) never reach the build tree on their own. The result is vendor
//! prefixed for [`style_targets`] and printed to `build_css` together with a
//! source map. Production output is minified, gets the `.min` suffix, and
//! its map is not linked from the stylesheet.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tracing::debug;

use crate::mode::BuildMode;
use crate::tasks::files::{
    collect_files, file_name, glob_set, is_partial, read_source, relative_str, with_suffix,
    write_file,
};
use crate::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

#[derive(Debug, Clone, Copy, Default)]
pub struct StyleCompiler;

/// A compiled stylesheet ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStylesheet {
    /// Output path relative to `build_css`.
    pub rel_output: String,
    pub code: String,
    pub map: String,
}

impl Tool for StyleCompiler {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let source_root = PathBuf::from(ctx.paths.dev_styles());
        let dest = PathBuf::from(ctx.paths.build_css());
        let mode = ctx.mode;

        Box::pin(async move {
            tokio::task::spawn_blocking(move || compile_tree(&source_root, &dest, mode))
                .await
                .context("style compiler worker panicked")?
        })
    }
}

fn compile_tree(source_root: &Path, dest: &Path, mode: BuildMode) -> Result<TaskReport> {
    let patterns = glob_set(&["**/*.css"])?;
    let mut report = TaskReport::default();

    for file in collect_files(source_root, &patterns)? {
        let Some(rel) = relative_str(source_root, &file) else {
            continue;
        };
        if is_partial(&rel) {
            continue;
        }

        let compiled = compile_stylesheet(source_root, &rel, mode)?;

        let css_path = dest.join(&compiled.rel_output);
        let map_path = dest.join(format!("{}.map", compiled.rel_output));
        write_file(&css_path, compiled.code.as_bytes())?;
        write_file(&map_path, compiled.map.as_bytes())?;
        debug!(source = %rel, output = ?css_path, "compiled stylesheet");

        report.outputs.push(css_path);
        report.outputs.push(map_path);
    }

    Ok(report)
}

/// Compile the entry stylesheet at `rel` (relative to `source_root`),
/// inlining everything it imports.
pub fn compile_stylesheet(
    source_root: &Path,
    rel: &str,
    mode: BuildMode,
) -> Result<CompiledStylesheet> {
    let rel_output = with_suffix(rel, mode.output_suffix());
    let entry = source_root.join(rel);

    let fs = FileProvider::new();
    let mut bundler = Bundler::new(&fs, None, ParserOptions::default());
    let mut sheet = bundler.bundle(&entry).map_err(|e| anyhow!("{rel}: {e}"))?;

    // Printer locations carry the bundler's per-file source index, so the
    // map's sources are registered in the same order.
    let mut map = SourceMap::new("/");
    for file in &sheet.sources {
        let path = Path::new(file);
        let name = relative_str(source_root, path).unwrap_or_else(|| file.clone());
        let index = map.add_source(&name);
        if !mode.is_production() {
            map.set_source_content(index as usize, &read_source(path)?)
                .map_err(|e| anyhow!("{rel}: embedding source content: {e:?}"))?;
        }
    }

    sheet
        .minify(MinifyOptions {
            targets: style_targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| anyhow!("{rel}: {e}"))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: mode.is_production(),
            source_map: Some(&mut map),
            targets: style_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("{rel}: {e}"))?;

    let mut code = printed.code;
    if !mode.is_production() {
        code.push_str(&format!(
            "\n/*# sourceMappingURL={}.map */\n",
            file_name(&rel_output)
        ));
    }

    let map = map
        .to_json(None)
        .map_err(|e| anyhow!("{rel}: serialising source map: {e:?}"))?;

    Ok(CompiledStylesheet {
        rel_output,
        code,
        map,
    })
}

/// Browser versions vendor prefixes are generated for.
pub fn style_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(version(90)),
        edge: Some(version(90)),
        firefox: Some(version(88)),
        safari: Some(version(13)),
        ios_saf: Some(version(13)),
        ..Browsers::default()
    })
}

fn version(major: u32) -> u32 {
    major << 16
}
