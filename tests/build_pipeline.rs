use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sitepipe::build_once;
use sitepipe::dag::TaskStatus;
use sitepipe::engine::GraphRunner;
use sitepipe::errors::SitepipeError;
use sitepipe::mode::BuildMode;
use sitepipe::pipeline::build_pipeline;
use sitepipe::tasks::{TaskKind, Toolbox};
use sitepipe_test_utils::builders::{context_for, recording_toolbox, write_file, write_sample_site};
use sitepipe_test_utils::tools::ExecutionLog;
use sitepipe_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

fn runner(root: &Path, mode: BuildMode) -> GraphRunner {
    GraphRunner::new(context_for(root, mode))
}

/// Every file under `dir`, keyed by its `/`-separated relative path.
fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                files.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    files
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

#[tokio::test]
async fn development_build_produces_the_full_site() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    let pipeline = build_pipeline(&Toolbox::builtin());

    let report = with_timeout(build_once(&runner(dir.path(), BuildMode::Development), &pipeline))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.results.len(), 9);

    let build = dir.path().join("build");
    let files: Vec<String> = snapshot(&build).into_keys().collect();
    assert_eq!(
        files,
        vec![
            "about.html",
            "assets/fonts/body.woff2",
            "assets/images/logo.png",
            "css/main.css",
            "css/main.css.map",
            "index.html",
            "js/main.js",
            "js/main.js.map",
            "js/modernizr-custom.js",
        ]
    );

    let index = read(&build, "index.html");
    assert!(index.contains("<header>Site</header>"));
    assert!(!index.contains("{%"));
    assert!(!index.contains("landing page"));

    let css = read(&build, "css/main.css");
    assert!(css.contains("-webkit-user-select"));
    assert!(css.contains("--ink: #222"));
    assert!(!css.contains("@import"));
    assert!(read(&build, "css/main.css.map").contains("_tokens.css"));
    assert!(read(&build, "js/main.js").contains("console.log"));

    let features = read(&build, "js/modernizr-custom.js");
    assert!(features.starts_with("/*! sitepipe feature detection: flexbox,customproperties,fetch */"));

    assert_eq!(
        fs::read(build.join("assets/images/logo.png")).unwrap(),
        fs::read(dir.path().join("src/assets/images/logo.png")).unwrap()
    );
}

#[tokio::test]
async fn production_build_minifies_and_renames_outputs() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    let pipeline = build_pipeline(&Toolbox::builtin());

    with_timeout(build_once(&runner(dir.path(), BuildMode::Production), &pipeline))
        .await
        .unwrap();

    let build = dir.path().join("build");
    assert!(build.join("css/main.min.css").is_file());
    assert!(build.join("css/main.min.css.map").is_file());
    assert!(!build.join("css/main.css").exists());

    let script = read(&build, "js/main.min.js");
    assert!(!script.contains("console.log"));
    assert!(!script.contains("/* entry */"));
    assert!(!build.join("js/main.js").exists());

    let css = read(&build, "css/main.min.css");
    assert!(css.starts_with(":root{--ink:#222}.layout{"));
    assert!(!css.contains("sourceMappingURL"));
    assert!(!script.contains("sourceMappingURL"));
}

#[tokio::test]
async fn repeated_builds_are_byte_identical() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    let pipeline = build_pipeline(&Toolbox::builtin());
    let runner = runner(dir.path(), BuildMode::Development);

    with_timeout(build_once(&runner, &pipeline)).await.unwrap();
    let first = snapshot(&dir.path().join("build"));
    with_timeout(build_once(&runner, &pipeline)).await.unwrap();
    let second = snapshot(&dir.path().join("build"));

    assert_eq!(first, second);
}

#[tokio::test]
async fn clean_removes_stale_outputs() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    write_file(dir.path(), "build/old-page.html", "stale");
    let pipeline = build_pipeline(&Toolbox::builtin());

    with_timeout(build_once(&runner(dir.path(), BuildMode::Development), &pipeline))
        .await
        .unwrap();

    assert!(!dir.path().join("build/old-page.html").exists());
    assert!(dir.path().join("build/index.html").exists());
}

#[tokio::test]
async fn broken_template_fails_the_build_but_not_its_siblings() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    write_file(
        dir.path(),
        "src/pages/contact.njk",
        "<body>{% include \"_missing.njk\" %}</body>",
    );
    let pipeline = build_pipeline(&Toolbox::builtin());
    let runner = runner(dir.path(), BuildMode::Development);

    let report = with_timeout(runner.run(&pipeline)).await.unwrap();

    assert!(matches!(
        report.status_of("render-pages"),
        Some(TaskStatus::Failed(msg)) if msg.contains("_missing.njk") && msg.contains("not found")
    ));
    assert_eq!(report.failed_names(), vec!["render-pages"]);
    assert!(dir.path().join("build/css/main.css").is_file());
    assert!(dir.path().join("build/js/main.js").is_file());

    let err = with_timeout(build_once(&runner, &pipeline)).await.unwrap_err();
    match err {
        SitepipeError::PipelineFailed { failed } => assert_eq!(failed, vec!["render-pages"]),
        other => panic!("expected PipelineFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn lint_findings_do_not_fail_the_build() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    write_file(
        dir.path(),
        "src/js/extra.js",
        "var legacy = 1;   \nif (legacy == 1) { debugger; }\n",
    );
    write_file(dir.path(), "src/styles/broken.css", ".a {}\n.b { color: red !important; }\n");
    let pipeline = build_pipeline(&Toolbox::builtin());

    let report = with_timeout(build_once(&runner(dir.path(), BuildMode::Development), &pipeline))
        .await
        .unwrap();

    assert_eq!(report.status_of("lint-scripts"), Some(&TaskStatus::Succeeded));
    assert_eq!(report.status_of("lint-styles"), Some(&TaskStatus::Succeeded));
}

#[tokio::test]
async fn missing_source_tree_still_builds() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/js/main.js", "const a = 1;\n");
    let pipeline = build_pipeline(&Toolbox::builtin());

    let report = with_timeout(build_once(&runner(dir.path(), BuildMode::Development), &pipeline))
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(dir.path().join("build/js/main.js").is_file());
    assert!(dir.path().join("build/js/modernizr-custom.js").is_file());
}

#[tokio::test]
async fn missing_script_entry_point_fails_bundling() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/styles/main.css", ".a { color: red; }\n");
    let pipeline = build_pipeline(&Toolbox::builtin());

    let report = with_timeout(runner(dir.path(), BuildMode::Development).run(&pipeline))
        .await
        .unwrap();

    assert_eq!(report.failed_names(), vec!["bundle-scripts"]);
    assert!(matches!(
        report.status_of("bundle-scripts"),
        Some(TaskStatus::Failed(msg)) if msg.contains("entry point main.js")
    ));
}

#[tokio::test]
async fn clean_runs_before_every_other_task() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let log = ExecutionLog::new();
    let pipeline = build_pipeline(&recording_toolbox(&log));

    with_timeout(build_once(&runner(dir.path(), BuildMode::Development), &pipeline))
        .await
        .unwrap();

    let entries = log.entries();
    assert_eq!(entries[0], "start:clean");
    assert_eq!(entries[1], "end:clean");
    let mut rest = log.started()[1..].to_vec();
    rest.sort();
    let mut expected: Vec<String> = TaskKind::ALL
        .iter()
        .filter(|k| **k != TaskKind::Clean)
        .map(|k| k.name().to_string())
        .collect();
    expected.sort();
    assert_eq!(rest, expected);
}

#[cfg(unix)]
#[tokio::test]
async fn configured_command_replaces_a_builtin_tool() {
    use sitepipe_test_utils::builders::ConfigBuilder;

    init_tracing();
    let dir = TempDir::new().unwrap();
    write_sample_site(dir.path());
    let cfg = ConfigBuilder::new()
        .with_tool(
            "copy-pages",
            "mkdir -p {build} && cp {dev_pages}about.html {build}about-us.html",
        )
        .with_tool("copy-assets", "echo cannot copy >&2; exit 7")
        .build();
    let pipeline = build_pipeline(&Toolbox::from_config(&cfg));

    let report = with_timeout(runner(dir.path(), BuildMode::Development).run(&pipeline))
        .await
        .unwrap();

    assert!(dir.path().join("build/about-us.html").is_file());
    assert!(!dir.path().join("build/about.html").exists());
    assert_eq!(report.failed_names(), vec!["copy-assets"]);
    assert!(matches!(
        report.status_of("copy-assets"),
        Some(TaskStatus::Failed(msg)) if msg.contains("exited with code 7")
    ));
}
