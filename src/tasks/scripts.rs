// src/tasks/scripts.rs

//! Built-in script "bundler".
//!
//! Module resolution belongs to a real bundler configured through
//! `[tools.bundle-scripts]`; the built-in emits each entry point as is, with
//! a line-accurate source map. In production it drops debug statements,
//! comments, blank lines and indentation, and the map is written without a
//! `sourceMappingURL` link.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use parcel_sourcemap::{OriginalLocation, SourceMap};
use tracing::debug;

use crate::mode::BuildMode;
use crate::tasks::files::{file_name, read_source, with_suffix, write_file};
use crate::tasks::{TaskContext, TaskReport, Tool, ToolFuture};

/// `console` methods treated as debug output.
const DEBUG_METHODS: &[&str] = &[
    "log", "debug", "info", "warn", "trace", "dir", "table", "time", "timeEnd", "group",
    "groupEnd",
];

/// Keywords after which a `/` starts a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

#[derive(Debug, Clone)]
pub struct ScriptBundler {
    entries: Vec<String>,
}

impl Default for ScriptBundler {
    fn default() -> Self {
        Self {
            entries: vec!["main.js".to_string()],
        }
    }
}

/// A bundled entry point ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledScript {
    /// Output path relative to `build_js`.
    pub rel_output: String,
    pub code: String,
    pub map: String,
}

impl Tool for ScriptBundler {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> ToolFuture<'a> {
        let source_root = PathBuf::from(ctx.paths.dev_scripts());
        let dest = PathBuf::from(ctx.paths.build_js());
        let entries = self.entries.clone();
        let mode = ctx.mode;

        Box::pin(async move {
            tokio::task::spawn_blocking(move || bundle_entries(&source_root, &dest, &entries, mode))
                .await
                .context("bundler worker panicked")?
        })
    }
}

fn bundle_entries(
    source_root: &Path,
    dest: &Path,
    entries: &[String],
    mode: BuildMode,
) -> Result<TaskReport> {
    let mut report = TaskReport::default();

    for entry in entries {
        let path = source_root.join(entry);
        let source = read_source(&path).with_context(|| format!("entry point {entry}"))?;
        let bundled = bundle_script(entry, &source, mode)?;

        let js_path = dest.join(&bundled.rel_output);
        let map_path = dest.join(format!("{}.map", bundled.rel_output));
        write_file(&js_path, bundled.code.as_bytes())?;
        write_file(&map_path, bundled.map.as_bytes())?;
        debug!(entry = %entry, output = ?js_path, "bundled script");

        report.outputs.push(js_path);
        report.outputs.push(map_path);
    }

    Ok(report)
}

/// Bundle one entry point. `rel` is the entry path relative to `dev_scripts`.
pub fn bundle_script(rel: &str, source: &str, mode: BuildMode) -> Result<BundledScript> {
    let rel_output = with_suffix(rel, mode.output_suffix());

    let mut map = SourceMap::new("/");
    let source_index = map.add_source(rel);
    if !mode.is_production() {
        map.set_source_content(source_index as usize, source)
            .map_err(|e| anyhow!("{rel}: embedding source content: {e:?}"))?;
    }

    let lines = if mode.is_production() {
        production_lines(source)
    } else {
        source
            .lines()
            .enumerate()
            .map(|(i, line)| EmittedLine {
                line: i as u32,
                column: 0,
                text: line.to_string(),
            })
            .collect()
    };

    let mut code = String::with_capacity(source.len());
    for (generated_line, emitted) in lines.iter().enumerate() {
        map.add_mapping(
            generated_line as u32,
            0,
            Some(OriginalLocation::new(
                emitted.line,
                emitted.column,
                source_index,
                None,
            )),
        );
        code.push_str(&emitted.text);
        code.push('\n');
    }
    if !mode.is_production() {
        code.push_str(&format!(
            "//# sourceMappingURL={}.map\n",
            file_name(&rel_output)
        ));
    }

    let map = map
        .to_json(None)
        .map_err(|e| anyhow!("{rel}: serialising source map: {e:?}"))?;

    Ok(BundledScript {
        rel_output,
        code,
        map,
    })
}

/// One output line and where it starts in the source.
#[derive(Debug)]
struct EmittedLine {
    line: u32,
    column: u32,
    text: String,
}

/// Strip the source, then drop blank lines and indentation outside
/// template literals.
fn production_lines(source: &str) -> Vec<EmittedLine> {
    let (text, newline_in_literal) = Stripper::new(source).run();

    let mut lines = Vec::new();
    for (idx, raw) in text.split('\n').enumerate() {
        let starts_in_literal = idx > 0 && newline_in_literal[idx - 1];
        let ends_in_literal = newline_in_literal.get(idx).copied().unwrap_or(false);

        let mut body = raw;
        if !ends_in_literal {
            body = body.trim_end();
        }
        let mut column = 0;
        if !starts_in_literal {
            let trimmed = body.trim_start();
            column = body.len() - trimmed.len();
            body = trimmed;
        }
        if body.is_empty() && !starts_in_literal && !ends_in_literal {
            continue;
        }

        lines.push(EmittedLine {
            line: idx as u32,
            column: column as u32,
            text: body.to_string(),
        });
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    Quoted(char),
    Template,
    Regex { in_class: bool },
    LineComment,
    BlockComment { spans_lines: bool },
}

/// Single pass over the source that removes comments and debug statements
/// while leaving string, template and regex literals untouched.
///
/// Every source newline survives, so output line `n` is source line `n`.
struct Stripper {
    src: Vec<char>,
    out: String,
    /// One entry per emitted newline: whether it sits inside a template
    /// literal (or a continued string) and so is part of a value.
    newline_in_literal: Vec<bool>,
    lex: Lex,
    /// Open brace count of each `${` expression we are inside.
    template_depths: Vec<usize>,
    /// Last significant code character emitted.
    last_sig: Option<char>,
    /// Identifier ending at `last_sig`, if any.
    last_word: String,
}

impl Stripper {
    fn new(source: &str) -> Self {
        Self {
            src: source.chars().collect(),
            out: String::with_capacity(source.len()),
            newline_in_literal: Vec::new(),
            lex: Lex::Code,
            template_depths: Vec::new(),
            last_sig: None,
            last_word: String::new(),
        }
    }

    fn run(mut self) -> (String, Vec<bool>) {
        let mut i = 0;
        while i < self.src.len() {
            i = self.step(i);
        }
        (self.out, self.newline_in_literal)
    }

    fn emit(&mut self, c: char, in_literal: bool) {
        if c == '\n' {
            self.newline_in_literal.push(in_literal);
        }
        self.out.push(c);
    }

    fn value_end(&mut self) {
        self.last_sig = Some(')');
        self.last_word.clear();
    }

    fn step(&mut self, i: usize) -> usize {
        let c = self.src[i];
        let next = self.src.get(i + 1).copied();

        match self.lex {
            Lex::LineComment => {
                if c == '\n' {
                    self.lex = Lex::Code;
                    self.emit('\n', false);
                }
                i + 1
            }
            Lex::BlockComment { spans_lines } => {
                if c == '*' && next == Some('/') {
                    self.lex = Lex::Code;
                    if !spans_lines {
                        self.out.push(' ');
                    }
                    return i + 2;
                }
                if c == '\n' {
                    self.emit('\n', false);
                    self.lex = Lex::BlockComment { spans_lines: true };
                }
                i + 1
            }
            Lex::Quoted(quote) => {
                if c == '\\' {
                    self.emit(c, false);
                    if let Some(n) = next {
                        self.emit(n, true);
                    }
                    return i + 2;
                }
                self.emit(c, false);
                if c == quote || c == '\n' {
                    self.lex = Lex::Code;
                    self.value_end();
                }
                i + 1
            }
            Lex::Template => {
                if c == '\\' {
                    self.emit(c, true);
                    if let Some(n) = next {
                        self.emit(n, true);
                    }
                    return i + 2;
                }
                if c == '`' {
                    self.emit(c, false);
                    self.lex = Lex::Code;
                    self.value_end();
                    return i + 1;
                }
                if c == '$' && next == Some('{') {
                    self.out.push_str("${");
                    self.template_depths.push(0);
                    self.lex = Lex::Code;
                    self.last_sig = Some('{');
                    self.last_word.clear();
                    return i + 2;
                }
                self.emit(c, true);
                i + 1
            }
            Lex::Regex { in_class } => {
                self.emit(c, false);
                match c {
                    '\\' => {
                        if let Some(n) = next {
                            self.emit(n, false);
                        }
                        return i + 2;
                    }
                    '[' => self.lex = Lex::Regex { in_class: true },
                    ']' => self.lex = Lex::Regex { in_class: false },
                    '/' if !in_class => {
                        self.lex = Lex::Code;
                        self.value_end();
                    }
                    '\n' => self.lex = Lex::Code,
                    _ => {}
                }
                i + 1
            }
            Lex::Code => self.code(i, c, next),
        }
    }

    fn code(&mut self, i: usize, c: char, next: Option<char>) -> usize {
        match c {
            '/' if next == Some('/') => {
                self.lex = Lex::LineComment;
                i + 2
            }
            '/' if next == Some('*') => {
                self.lex = Lex::BlockComment { spans_lines: false };
                i + 2
            }
            '/' if self.regex_allowed() => {
                self.lex = Lex::Regex { in_class: false };
                self.emit(c, false);
                i + 1
            }
            '"' | '\'' => {
                self.lex = Lex::Quoted(c);
                self.emit(c, false);
                i + 1
            }
            '`' => {
                self.lex = Lex::Template;
                self.emit(c, false);
                i + 1
            }
            c if is_ident_start(c) => {
                let member_access = i > 0 && (self.src[i - 1] == '.' || is_ident(self.src[i - 1]));
                if !member_access {
                    if let Some(end) = debug_statement_end(&self.src, i) {
                        return self.drop_debug_statement(i, end);
                    }
                }
                let mut end = i;
                while end < self.src.len() && is_ident(self.src[end]) {
                    end += 1;
                }
                let word: String = self.src[i..end].iter().collect();
                self.out.push_str(&word);
                self.last_sig = word.chars().last();
                self.last_word = word;
                end
            }
            _ => {
                if c == '{' {
                    if let Some(depth) = self.template_depths.last_mut() {
                        *depth += 1;
                    }
                } else if c == '}' {
                    if let Some(depth) = self.template_depths.last_mut() {
                        if *depth == 0 {
                            self.template_depths.pop();
                            self.out.push('}');
                            self.lex = Lex::Template;
                            return i + 1;
                        }
                        *depth -= 1;
                    }
                }
                self.emit(c, false);
                if !c.is_whitespace() {
                    self.last_sig = Some(c);
                    self.last_word.clear();
                }
                i + 1
            }
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.last_sig {
            None => true,
            Some(c) if "(,=:[!&|?{};+-*%<>~^".contains(c) => true,
            Some(_) => REGEX_KEYWORDS.contains(&self.last_word.as_str()),
        }
    }

    /// Remove `src[start..end]`. At statement position the whole statement
    /// goes, including a trailing `;`; inside an expression the call is
    /// replaced by `void 0` so the surrounding code keeps its shape.
    fn drop_debug_statement(&mut self, start: usize, end: usize) -> usize {
        let mut end = end;
        if matches!(self.last_sig, None | Some(';' | '{' | '}')) {
            let mut k = end;
            while k < self.src.len() && matches!(self.src[k], ' ' | '\t') {
                k += 1;
            }
            if self.src.get(k) == Some(&';') {
                end = k + 1;
            }
        } else {
            self.out.push_str("void 0");
            self.last_sig = Some('0');
            self.last_word.clear();
        }

        let newlines = self.src[start..end].iter().filter(|c| **c == '\n').count();
        for _ in 0..newlines {
            self.emit('\n', false);
        }
        end
    }
}

/// End of a `debugger` keyword or a balanced `console.<method>(..)` call
/// starting at `start`.
fn debug_statement_end(src: &[char], start: usize) -> Option<usize> {
    if starts_with_word(src, start, "debugger") {
        return Some(start + "debugger".len());
    }
    if !starts_with_word(src, start, "console") {
        return None;
    }

    let mut j = skip_whitespace(src, start + "console".len());
    if src.get(j) != Some(&'.') {
        return None;
    }
    j = skip_whitespace(src, j + 1);
    let method_start = j;
    while j < src.len() && is_ident(src[j]) {
        j += 1;
    }
    let method: String = src[method_start..j].iter().collect();
    if !DEBUG_METHODS.contains(&method.as_str()) {
        return None;
    }
    j = skip_whitespace(src, j);
    if src.get(j) != Some(&'(') {
        return None;
    }

    let mut depth = 0usize;
    while j < src.len() {
        match src[j] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j + 1);
                }
            }
            quote @ ('"' | '\'' | '`') => {
                j += 1;
                while j < src.len() && src[j] != quote {
                    if src[j] == '\\' {
                        j += 1;
                    }
                    j += 1;
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

fn starts_with_word(src: &[char], start: usize, word: &str) -> bool {
    let len = word.chars().count();
    start + len <= src.len()
        && src[start..start + len].iter().copied().eq(word.chars())
        && !src.get(start + len).is_some_and(|c| is_ident(*c))
}

fn skip_whitespace(src: &[char], mut i: usize) -> usize {
    while i < src.len() && src[i].is_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
