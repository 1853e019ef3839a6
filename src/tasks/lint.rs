// src/tasks/lint.rs

//! Built-in line-based linters for stylesheets and scripts.
//!
//! Findings are reported as [`Diagnostic`]s and never fail the task.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::paths::PathSet;
use crate::tasks::files::{collect_files, glob_set, read_source};
use crate::tasks::{Diagnostic, TaskContext, TaskReport, Tool, ToolFuture};

/// A single line rule.
#[derive(Debug)]
pub struct LintRule {
    pub name: &'static str,
    pub message: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl LintRule {
    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

static TRAILING_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+$").expect("static regex"));
static EMPTY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*\}").expect("static regex"));
static IMPORTANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\s*important").expect("static regex"));
static DEBUGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdebugger\b").expect("static regex"));
static VAR_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*var\s").expect("static regex"));
static LOOSE_EQUALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^=!<>])(?:==|!=)(?:$|[^=])").expect("static regex"));

pub static STYLE_RULES: [LintRule; 3] = [
    LintRule {
        name: "no-trailing-whitespace",
        message: "unexpected trailing whitespace",
        pattern: &TRAILING_WHITESPACE,
    },
    LintRule {
        name: "block-no-empty",
        message: "unexpected empty block",
        pattern: &EMPTY_BLOCK,
    },
    LintRule {
        name: "declaration-no-important",
        message: "unexpected !important",
        pattern: &IMPORTANT,
    },
];

pub static SCRIPT_RULES: [LintRule; 4] = [
    LintRule {
        name: "no-trailing-spaces",
        message: "trailing spaces not allowed",
        pattern: &TRAILING_WHITESPACE,
    },
    LintRule {
        name: "no-debugger",
        message: "unexpected 'debugger' statement",
        pattern: &DEBUGGER,
    },
    LintRule {
        name: "no-var",
        message: "unexpected var, use let or const instead",
        pattern: &VAR_DECL,
    },
    LintRule {
        name: "eqeqeq",
        message: "expected '===' and '!==' instead of '==' and '!='",
        pattern: &LOOSE_EQUALITY,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct Linter {
    label: &'static str,
    source: fn(&PathSet) -> &str,
    pattern: &'static str,
    rules: &'static [LintRule],
}

impl Linter {
    pub fn styles() -> Self {
        Self {
            label: "styles",
            source: PathSet::dev_styles,
            pattern: "**/*.css",
            rules: &STYLE_RULES,
        }
    }

    pub fn scripts() -> Self {
        Self {
            label: "scripts",
            source: PathSet::dev_scripts,
            pattern: "**/*.js",
            rules: &SCRIPT_RULES,
        }
    }
}

impl Tool for Linter {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let root = PathBuf::from((self.source)(&ctx.paths));
        let pattern = self.pattern;
        let rules = self.rules;
        let label = self.label;

        Box::pin(async move {
            let diagnostics = tokio::task::spawn_blocking(move || lint_tree(&root, pattern, rules))
                .await
                .context("linter worker panicked")??;

            for diag in &diagnostics {
                warn!(lint = label, "{diag}");
            }
            info!(lint = label, problems = diagnostics.len(), "lint finished");

            Ok(TaskReport {
                outputs: Vec::new(),
                diagnostics,
            })
        })
    }
}

fn lint_tree(root: &Path, pattern: &str, rules: &'static [LintRule]) -> Result<Vec<Diagnostic>> {
    let patterns = glob_set(&[pattern])?;
    let mut diagnostics = Vec::new();
    for file in collect_files(root, &patterns)? {
        let source = read_source(&file)?;
        diagnostics.extend(lint_source(&file, &source, rules));
    }
    Ok(diagnostics)
}

/// Apply `rules` to every line of `source`.
pub fn lint_source(path: &Path, source: &str, rules: &'static [LintRule]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        for rule in rules {
            if rule.matches(line) {
                diagnostics.push(Diagnostic {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    rule: rule.name,
                    message: rule.message.to_string(),
                });
            }
        }
    }
    diagnostics
}
