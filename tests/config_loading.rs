use std::fs;
use std::path::PathBuf;

use sitepipe::config::{load_and_validate, load_or_default};
use sitepipe::errors::SitepipeError;
use sitepipe::types::TriggerWhileRunningBehaviour;
use sitepipe_test_utils::builders::ConfigBuilder;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("Sitepipe.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn full_config_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[paths]
dev = "./site/"
build = "./public"

[server]
host = "0.0.0.0"
port = 8080
enabled = false

[watch]
debounce_ms = 250
triggered_while_running_behaviour = "cancel"
queue_length = 3
use_hash = true

[tools.compile-styles]
cmd = "sass {dev_styles}main.scss {build_css}main.css"
production_cmd = "sass --style=compressed {dev_styles}main.scss {build_css}main.min.css"
"#,
    );

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.paths().dev, "./site/");
    assert_eq!(cfg.paths().build, "./public");
    assert_eq!(cfg.server().host, "0.0.0.0");
    assert_eq!(cfg.server().port, 8080);
    assert!(!cfg.server().enabled);
    assert_eq!(cfg.watch().debounce_ms, 250);
    assert_eq!(
        cfg.watch().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Cancel
    );
    assert_eq!(cfg.watch().queue_length, 3);
    assert!(cfg.watch().use_hash);

    let tools: Vec<_> = cfg.tools().collect();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].0, "compile-styles");
    assert!(tools[0].1.production_cmd.is_some());
}

#[test]
fn empty_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.paths().dev, "./src/");
    assert_eq!(cfg.paths().build, "./build/");
    assert_eq!(cfg.server().host, "127.0.0.1");
    assert_eq!(cfg.server().port, 3000);
    assert!(cfg.server().enabled);
    assert_eq!(cfg.watch().debounce_ms, 100);
    assert_eq!(cfg.watch().queue_length, 1);
    assert_eq!(
        cfg.watch().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Queue
    );
    assert_eq!(cfg.tools().count(), 0);
}

#[test]
fn missing_default_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_or_default(dir.path().join("Sitepipe.toml"), false).unwrap();
    assert_eq!(cfg.server().port, 3000);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_or_default(dir.path().join("custom.toml"), true).unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(msg) if msg.contains("does not exist")));
}

#[test]
fn unknown_tool_name_is_rejected() {
    let err = ConfigBuilder::new()
        .with_tool("compile-sass", "sass in.scss out.css")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, SitepipeError::UnknownTask(msg) if msg.contains("compile-sass")));
}

#[test]
fn unknown_placeholder_is_rejected() {
    let err = ConfigBuilder::new()
        .with_tool("bundle-scripts", "esbuild {dev_scripts}main.js --outdir={build_scripts}")
        .try_build()
        .unwrap_err();
    assert!(
        matches!(err, SitepipeError::ConfigError(msg) if msg.contains("unknown placeholder '{build_scripts}'"))
    );
}

#[test]
fn placeholders_in_production_command_are_checked_too() {
    let err = ConfigBuilder::new()
        .with_production_tool("compile-styles", "sass {dev_styles}", "sass {nope}")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(msg) if msg.contains("production_cmd")));
}

#[test]
fn known_placeholders_are_accepted() {
    let cfg = ConfigBuilder::new()
        .with_tool(
            "render-pages",
            "nunjucks {dev_pages} -o {build} --env {mode}",
        )
        .try_build();
    assert!(cfg.is_ok());
}

#[test]
fn empty_command_is_rejected() {
    let err = ConfigBuilder::new()
        .with_tool("clean", "   ")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(msg) if msg.contains("must not be empty")));
}

#[test]
fn zero_values_are_rejected() {
    assert!(matches!(
        ConfigBuilder::new().with_queue_length(0).try_build(),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("queue_length")
    ));
    assert!(matches!(
        ConfigBuilder::new().with_debounce_ms(0).try_build(),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("debounce_ms")
    ));
    assert!(matches!(
        ConfigBuilder::new().with_port(0).try_build(),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("port")
    ));
}

#[test]
fn empty_roots_are_rejected() {
    let err = ConfigBuilder::new().with_roots("", "./build/").try_build().unwrap_err();
    assert!(matches!(err, SitepipeError::ConfigError(_)));
}

#[test]
fn unknown_fields_fail_to_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[server]\nport = 3000\nlivereload = true\n");
    assert!(matches!(load_and_validate(&path), Err(SitepipeError::TomlError(_))));
}

#[test]
fn invalid_behaviour_fails_to_parse() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[watch]\ntriggered_while_running_behaviour = \"restart\"\n");
    assert!(matches!(load_and_validate(&path), Err(SitepipeError::TomlError(_))));
}

#[test]
fn behaviour_parses_from_str() {
    assert_eq!(
        " Cancel ".parse::<TriggerWhileRunningBehaviour>(),
        Ok(TriggerWhileRunningBehaviour::Cancel)
    );
    assert!("restart".parse::<TriggerWhileRunningBehaviour>().is_err());
}
