// src/tasks/features.rs

//! Built-in feature-detection bundle generator.
//!
//! Scans script and style sources for uses of a fixed table of browser
//! features and emits `build_js/modernizr-custom.js`, which defines
//! `window.Modernizr` with one boolean per detected feature and tags `<html>`
//! with `feature` / `no-feature` classes. The `hidden` test is never part of
//! the table.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::tasks::files::{collect_files, glob_set, read_source, write_file};
use crate::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

/// Output file name inside `build_js`.
pub const OUTPUT_NAME: &str = "modernizr-custom.js";

/// A feature the generator knows how to detect in sources and test for at
/// runtime.
#[derive(Debug)]
pub struct FeatureTest {
    pub name: &'static str,
    usage: &'static str,
    pub test: &'static str,
}

pub static FEATURE_TESTS: &[FeatureTest] = &[
    FeatureTest {
        name: "flexbox",
        usage: r"display\s*:\s*(?:inline-)?flex\b",
        test: "return!!(w.CSS&&CSS.supports('display','flex'))",
    },
    FeatureTest {
        name: "cssgrid",
        usage: r"display\s*:\s*(?:inline-)?grid\b",
        test: "return!!(w.CSS&&CSS.supports('display','grid'))",
    },
    FeatureTest {
        name: "customproperties",
        usage: r"var\(--",
        test: "return!!(w.CSS&&CSS.supports('--t','0'))",
    },
    FeatureTest {
        name: "fetch",
        usage: r"\bfetch\s*\(",
        test: "return'fetch'in w",
    },
    FeatureTest {
        name: "promises",
        usage: r"\bPromise\b",
        test: "return'Promise'in w",
    },
    FeatureTest {
        name: "intersectionobserver",
        usage: r"\bIntersectionObserver\b",
        test: "return'IntersectionObserver'in w",
    },
    FeatureTest {
        name: "localstorage",
        usage: r"\blocalStorage\b",
        test: "try{return!!w.localStorage}catch(e){return!1}",
    },
];

static USAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    FEATURE_TESTS
        .iter()
        .map(|f| Regex::new(f.usage).expect("static regex"))
        .collect()
});

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDetection;

impl Tool for FeatureDetection {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let scripts = PathBuf::from(ctx.paths.dev_scripts());
        let styles = PathBuf::from(ctx.paths.dev_styles());
        let dest = PathBuf::from(ctx.paths.build_js());

        Box::pin(async move {
            tokio::task::spawn_blocking(move || generate(&scripts, &styles, &dest))
                .await
                .context("feature detection worker panicked")?
        })
    }
}

fn generate(scripts: &Path, styles: &Path, dest: &Path) -> Result<TaskReport> {
    let mut sources = Vec::new();
    for file in collect_files(scripts, &glob_set(&["**/*.js"])?)? {
        sources.push(read_source(&file)?);
    }
    for file in collect_files(styles, &glob_set(&["**/*.css"])?)? {
        sources.push(read_source(&file)?);
    }

    let detected = detect_features(sources.iter().map(String::as_str));
    debug!(?detected, "feature usages detected");

    let out_path = dest.join(OUTPUT_NAME);
    write_file(&out_path, render_bundle(&detected).as_bytes())?;

    Ok(TaskReport {
        outputs: vec![out_path],
        diagnostics: Vec::new(),
    })
}

/// Names of the features used anywhere in `sources`, in table order.
pub fn detect_features<'s>(sources: impl IntoIterator<Item = &'s str>) -> Vec<&'static str> {
    let mut used = vec![false; FEATURE_TESTS.len()];
    for source in sources {
        for (idx, pattern) in USAGE_PATTERNS.iter().enumerate() {
            if !used[idx] && pattern.is_match(source) {
                used[idx] = true;
            }
        }
    }

    FEATURE_TESTS
        .iter()
        .zip(used)
        .filter(|(_, used)| *used)
        .map(|(feature, _)| feature.name)
        .collect()
}

/// The generated script for the given feature names.
///
/// Besides one test per detected feature, the bundle exposes
/// `Modernizr.addTest(name, fn|bool)` and `Modernizr.testProp(prop, value?)`
/// so pages can register their own checks. Tests run bound to `Modernizr`.
pub fn render_bundle(features: &[&str]) -> String {
    let tests: Vec<String> = FEATURE_TESTS
        .iter()
        .filter(|f| features.contains(&f.name))
        .map(|f| format!("\"{}\":function(){{{}}}", f.name, f.test))
        .collect();

    format!(
        "/*! sitepipe feature detection: {} */\n\
         !function(w,d){{var M={{}},e=d.documentElement,\
         b=function(f,c){{return function(){{return f.apply(c,arguments)}}}},\
         t={{{}}};\
         M.addTest=function(n,f){{n=n.toLowerCase();if(n in M)return M;\
         var r=!!(typeof f==\"function\"?b(f,M)():f);\
         M[n]=r;e.className+=\" \"+(r?\"\":\"no-\")+n;return M}};\
         M.testProp=function(p,v){{var s=d.createElement(\"modernizr\").style;\
         if(!(p in s))return!1;if(v===void 0)return!0;s[p]=v;return s[p]!==\"\"}};\
         for(var k in t)M.addTest(k,t[k]);\
         w.Modernizr=M}}(window,document);\n",
        features.join(","),
        tests.join(",")
    )
}
