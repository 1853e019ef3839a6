use std::path::Path;

use sitepipe::mode::BuildMode;
use sitepipe::tasks::features::{detect_features, render_bundle};
use sitepipe::tasks::files::{is_partial, with_suffix};
use sitepipe::tasks::lint::{SCRIPT_RULES, STYLE_RULES, lint_source};
use sitepipe::tasks::pages::render_template;
use sitepipe::tasks::scripts::bundle_script;
use sitepipe::tasks::styles::compile_stylesheet;
use sitepipe_test_utils::builders::write_file;
use tempfile::TempDir;

const STYLESHEET: &str = ".layout {\n  display: flex;\n}\n\n.card {\n  user-select: none;\n}\n";

const SCRIPT: &str = "/* entry\n   point */\nconst items = [1, 2, 3];\nconsole.log(items);\n\n// helper\nfunction total(xs) {\n  debugger;\n  return xs.reduce((a, b) => a + b, 0);\n}\n";

fn source_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (rel, contents) in files {
        write_file(dir.path(), rel, contents);
    }
    dir
}

fn production_script(source: &str) -> String {
    bundle_script("main.js", source, BuildMode::Production).unwrap().code
}

#[test]
fn development_stylesheet_keeps_layout_and_embeds_sources() {
    let dir = source_dir(&[("main.css", STYLESHEET)]);

    let compiled = compile_stylesheet(dir.path(), "main.css", BuildMode::Development).unwrap();

    assert_eq!(compiled.rel_output, "main.css");
    assert!(compiled.code.contains(".layout {\n"));
    assert!(compiled.code.contains("-webkit-user-select: none"));
    assert!(compiled.code.ends_with("/*# sourceMappingURL=main.css.map */\n"));
    assert!(compiled.map.contains("\"mappings\""));
    assert!(compiled.map.contains("\"main.css\""));
    assert!(compiled.map.contains("display: flex"));
}

#[test]
fn production_stylesheet_is_minified_with_min_suffix() {
    let dir = source_dir(&[("pages/home.css", STYLESHEET)]);

    let compiled = compile_stylesheet(dir.path(), "pages/home.css", BuildMode::Production).unwrap();

    assert_eq!(compiled.rel_output, "pages/home.min.css");
    assert!(compiled.code.starts_with(".layout{display:flex}"));
    assert!(compiled.code.contains("-webkit-user-select:none"));
    assert!(!compiled.code.contains("sourceMappingURL"));
    assert!(compiled.map.contains("pages/home.css"));
    assert!(!compiled.map.contains("display: flex"));
}

#[test]
fn imported_partials_are_inlined() {
    let dir = source_dir(&[
        ("main.css", "@import \"_vars.css\";\n.a { color: var(--ink); }\n"),
        ("_vars.css", ":root { --ink: #222; }\n"),
    ]);

    let dev = compile_stylesheet(dir.path(), "main.css", BuildMode::Development).unwrap();
    let prod = compile_stylesheet(dir.path(), "main.css", BuildMode::Production).unwrap();

    assert!(!dev.code.contains("@import"), "{}", dev.code);
    assert!(dev.code.contains("--ink: #222"));
    assert!(dev.code.find("--ink: #222") < dev.code.find(".a"));
    assert!(dev.map.contains("\"_vars.css\""));
    assert!(!prod.code.contains("@import"));
    assert!(prod.code.contains("--ink:#222"));
}

#[test]
fn missing_import_fails_the_stylesheet() {
    let dir = source_dir(&[("main.css", "@import \"_gone.css\";\n.a { color: red; }\n")]);

    let err = compile_stylesheet(dir.path(), "main.css", BuildMode::Development).unwrap_err();

    assert!(format!("{err:#}").starts_with("main.css: "));
}

#[test]
fn production_output_is_never_larger_than_development() {
    let stylesheets = [STYLESHEET, ".a{color:red}", "", "@media (min-width: 1px) { .b { margin: 0 } }\n"];
    for source in stylesheets {
        let dir = source_dir(&[("main.css", source)]);
        let dev = compile_stylesheet(dir.path(), "main.css", BuildMode::Development).unwrap();
        let prod = compile_stylesheet(dir.path(), "main.css", BuildMode::Production).unwrap();
        assert!(prod.code.len() <= dev.code.len(), "stylesheet {source:?}");
    }

    let scripts = [SCRIPT, "run();\n", "run()", "", "x"];
    for source in scripts {
        let dev = bundle_script("main.js", source, BuildMode::Development).unwrap();
        let prod = bundle_script("main.js", source, BuildMode::Production).unwrap();
        assert!(prod.code.len() <= dev.code.len(), "script {source:?}");
    }
}

#[test]
fn development_script_is_emitted_unchanged() {
    let bundled = bundle_script("main.js", SCRIPT, BuildMode::Development).unwrap();

    assert_eq!(bundled.rel_output, "main.js");
    assert!(bundled.code.starts_with(SCRIPT));
    assert!(bundled.code.ends_with("//# sourceMappingURL=main.js.map\n"));
    assert!(bundled.map.contains("\"mappings\""));
    assert!(bundled.map.contains("main.js"));
}

#[test]
fn production_script_drops_debug_statements_and_comments() {
    let bundled = bundle_script("main.js", SCRIPT, BuildMode::Production).unwrap();

    assert_eq!(bundled.rel_output, "main.min.js");
    assert_eq!(
        bundled.code,
        "const items = [1, 2, 3];\nfunction total(xs) {\nreturn xs.reduce((a, b) => a + b, 0);\n}\n"
    );
    assert!(bundled.map.contains("\"mappings\""));
    assert!(!bundled.map.contains("xs.reduce"));
}

#[test]
fn debug_call_is_removed_without_the_rest_of_its_line() {
    assert_eq!(production_script("console.log(\"boot\"); init();"), "init();\n");
    assert_eq!(
        production_script("start();\nconsole.warn(\"a)\", f(1));  done();\n"),
        "start();\ndone();\n"
    );
}

#[test]
fn debug_call_inside_an_expression_becomes_void() {
    assert_eq!(
        production_script("if (verbose) console.log(\"x\")\nrun()\n"),
        "if (verbose) void 0\nrun()\n"
    );
    assert_eq!(
        production_script("const r = ready && console.info(\"ok\");\n"),
        "const r = ready && void 0;\n"
    );
    assert_eq!(
        production_script("logger.console.log(1);\n"),
        "logger.console.log(1);\n"
    );
}

#[test]
fn comment_markers_inside_literals_are_kept() {
    assert_eq!(
        production_script("const a = \"/*\";\nstart();\nconst b = \"*/\";\n"),
        "const a = \"/*\";\nstart();\nconst b = \"*/\";\n"
    );
    assert_eq!(
        production_script("const url = 'http://example.com'; // home\n"),
        "const url = 'http://example.com';\n"
    );
    assert_eq!(
        production_script("const re = /\\/\\*+/g; run(); /* tail */\n"),
        "const re = /\\/\\*+/g; run();\n"
    );
    assert_eq!(
        production_script("const half = total / 2; /* note */ done();\n"),
        "const half = total / 2;   done();\n"
    );
}

#[test]
fn template_literal_lines_are_kept_verbatim() {
    let source = "const page = `\n  <main>\n\n    // not a comment\n  </main>`;\nconsole.log(page);\n";

    assert_eq!(
        production_script(source),
        "const page = `\n  <main>\n\n    // not a comment\n  </main>`;\n"
    );
    assert_eq!(
        production_script("const s = `a ${ {x: 1}.x /* c */ } b`;\n"),
        "const s = `a ${ {x: 1}.x   } b`;\n"
    );
}

#[test]
fn templates_resolve_includes_and_strip_comments() {
    let dir = source_dir(&[
        ("index.njk", "{# note #}<body>{% include \"_nav.njk\" %}</body>"),
        ("_nav.njk", "<nav>{%- include '_links.njk' -%}</nav>"),
        ("_links.njk", "<a href=\"/\">home</a>"),
    ]);

    let html = render_template(dir.path(), "index.njk").unwrap();

    assert_eq!(html, "<body><nav><a href=\"/\">home</a></nav></body>");
}

#[test]
fn templates_extend_layouts_and_set_variables() {
    let dir = source_dir(&[
        ("_base.njk", "<html>{% block body %}{% endblock %}</html>"),
        (
            "index.njk",
            "{% extends \"_base.njk\" %}{% set t = \"Hi\" %}{% block body %}{{ t }}{% endblock %}",
        ),
        (
            "layouts/_list.njk",
            "{% for item in [\"a\", \"b\"] %}<li>{{ item | upper }}</li>{% endfor %}",
        ),
        ("list.njk", "<ul>{% include \"layouts/_list.njk\" %}</ul>"),
    ]);

    assert_eq!(render_template(dir.path(), "index.njk").unwrap(), "<html>Hi</html>");
    assert_eq!(
        render_template(dir.path(), "list.njk").unwrap(),
        "<ul><li>A</li><li>B</li></ul>"
    );
}

#[test]
fn missing_include_names_template_and_partial() {
    let dir = source_dir(&[("index.njk", "{% include \"_gone.njk\" %}")]);

    let err = render_template(dir.path(), "index.njk").unwrap_err();

    let message = format!("{err:#}");
    assert!(message.starts_with("template index.njk"), "{message}");
    assert!(message.contains("_gone.njk") && message.contains("not found"), "{message}");
}

#[test]
fn includes_cannot_leave_the_pages_directory() {
    let root = TempDir::new().unwrap();
    write_file(root.path(), "secret.njk", "top secret");
    write_file(root.path(), "pages/index.njk", "{% include \"../secret.njk\" %}");

    let err = render_template(&root.path().join("pages"), "index.njk").unwrap_err();

    assert!(format!("{err:#}").contains("not found"));
}

#[test]
fn unknown_tags_fail_instead_of_leaking_into_html() {
    let dir = source_dir(&[("index.njk", "<p>{% frobnicate %}</p>")]);

    assert!(render_template(dir.path(), "index.njk").is_err());
}

#[test]
fn recursive_includes_are_reported() {
    let dir = source_dir(&[
        ("a.njk", "{% include \"b.njk\" %}"),
        ("b.njk", "{% include \"a.njk\" %}"),
    ]);

    let err = render_template(dir.path(), "a.njk").unwrap_err();

    assert!(format!("{err:#}").contains("recursive include via a.njk -> b.njk -> a.njk"));
}

#[test]
fn script_lint_reports_each_rule_with_line_numbers() {
    let source = "var x = 1;\nif (x == 2) { debugger; }  \nif (x === 3) {}\n";

    let diags = lint_source(Path::new("main.js"), source, &SCRIPT_RULES);

    let found: Vec<(usize, &str)> = diags.iter().map(|d| (d.line, d.rule)).collect();
    assert_eq!(
        found,
        vec![
            (1, "no-var"),
            (2, "no-trailing-spaces"),
            (2, "no-debugger"),
            (2, "eqeqeq"),
        ]
    );
    assert_eq!(
        diags[0].to_string(),
        "main.js:1: unexpected var, use let or const instead (no-var)"
    );
}

#[test]
fn style_lint_reports_empty_blocks_and_important() {
    let source = ".a {}\n.b { color: red !important; }\n.c { color: blue; }\n";

    let diags = lint_source(Path::new("main.css"), source, &STYLE_RULES);

    let found: Vec<(usize, &str)> = diags.iter().map(|d| (d.line, d.rule)).collect();
    assert_eq!(
        found,
        vec![(1, "block-no-empty"), (2, "declaration-no-important")]
    );
}

#[test]
fn feature_detection_follows_table_order() {
    let sources = [
        "fetch('/api').then(r => localStorage.setItem('x', r))",
        ".grid { display: grid; } .row { display: inline-flex; }",
    ];

    let detected = detect_features(sources);

    assert_eq!(detected, vec!["flexbox", "cssgrid", "fetch", "localstorage"]);
}

#[test]
fn feature_bundle_only_contains_detected_tests() {
    let bundle = render_bundle(&["flexbox", "fetch"]);

    assert!(bundle.starts_with("/*! sitepipe feature detection: flexbox,fetch */\n"));
    assert!(bundle.contains("\"flexbox\":function(){"));
    assert!(bundle.contains("\"fetch\":function(){return'fetch'in w}"));
    assert!(!bundle.contains("cssgrid"));
    assert!(bundle.contains("w.Modernizr=M"));
    assert_eq!(bundle, render_bundle(&["flexbox", "fetch"]));
}

#[test]
fn feature_bundle_exposes_add_test_and_test_prop() {
    let bundle = render_bundle(&[]);

    assert!(bundle.contains("M.addTest=function(n,f)"));
    assert!(bundle.contains("M.testProp=function(p,v)"));
    assert!(bundle.contains("for(var k in t)M.addTest(k,t[k])"));
    assert!(bundle.contains("t={};"));
    assert!(!bundle.contains("hidden"));
}

#[test]
fn suffix_goes_before_the_extension() {
    assert_eq!(with_suffix("main.css", ".min"), "main.min.css");
    assert_eq!(with_suffix("vendor/app.js", ".min"), "vendor/app.min.js");
    assert_eq!(with_suffix("v1.2/noext", ".min"), "v1.2/noext.min");
    assert_eq!(with_suffix(".hidden", ".min"), ".hidden.min");
    assert_eq!(with_suffix("main.css", ""), "main.css");
}

#[test]
fn partials_are_underscore_prefixed_files() {
    assert!(is_partial("_tokens.css"));
    assert!(is_partial("nested/_header.njk"));
    assert!(!is_partial("_dir/page.njk"));
    assert!(!is_partial("main.css"));
}

#[cfg(unix)]
mod command_tool {
    use std::fs;

    use sitepipe::exec::CommandTool;
    use sitepipe::mode::BuildMode;
    use sitepipe::tasks::{TaskKind, Tool};
    use sitepipe_test_utils::builders::context_for;
    use tempfile::TempDir;

    #[tokio::test]
    async fn command_sees_expanded_paths_and_mode_environment() {
        let dir = TempDir::new().unwrap();
        let ctx = context_for(dir.path(), BuildMode::Production);
        let tool = CommandTool::new(
            TaskKind::Clean,
            "echo dev > {build}mode.txt".to_string(),
            Some("mkdir -p {build} && printf '%s %s' \"$NODE_ENV\" {mode} > {build}mode.txt".to_string()),
        );

        tool.run(&ctx).await.unwrap();

        let written = fs::read_to_string(dir.path().join("build/mode.txt")).unwrap();
        assert_eq!(written, "production production");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let ctx = context_for(dir.path(), BuildMode::Development);
        let tool = CommandTool::new(TaskKind::LintScripts, "exit 3".to_string(), None);

        let err = tool.run(&ctx).await.unwrap_err();

        assert!(format!("{err:#}").contains("exited with code 3"));
    }
}
