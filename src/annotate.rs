//! Line-tagged source output and the payload handed to the external
//! templating/highlighting step.

use std::path::Path;

use serde::Serialize;

use crate::detect::Format;
use crate::model::{classify_line, covered_lines, missing_lines, FileCoverage};

/// CSS class for instrumented lines that executed.
pub const COVERED_CLASS: &str = "cvr-line-y";
/// CSS class for instrumented lines that never executed.
pub const MISSED_CLASS: &str = "cvr-line-n";

/// Syntax-highlighting hint understood by the templating step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageHint {
    Bash,
    Css,
    Go,
    Javascript,
    Less,
    Markdown,
    Python,
    Sql,
    Clike,
}

impl LanguageHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageHint::Bash => "bash",
            LanguageHint::Css => "css",
            LanguageHint::Go => "go",
            LanguageHint::Javascript => "javascript",
            LanguageHint::Less => "less",
            LanguageHint::Markdown => "markdown",
            LanguageHint::Python => "python",
            LanguageHint::Sql => "sql",
            LanguageHint::Clike => "clike",
        }
    }
}

impl std::fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language hint for `path`, by exact (case-sensitive) extension.
pub fn file_type_of(path: &str) -> LanguageHint {
    let ext = Path::new(path).extension().and_then(|e| e.to_str());
    match ext {
        Some("bash") => LanguageHint::Bash,
        Some("css") => LanguageHint::Css,
        Some("go") => LanguageHint::Go,
        Some("js") => LanguageHint::Javascript,
        Some("less") => LanguageHint::Less,
        Some("md") => LanguageHint::Markdown,
        Some("python") => LanguageHint::Python,
        Some("sql") => LanguageHint::Sql,
        _ => LanguageHint::Clike,
    }
}

/// Wrap each covered or missed line of `source` in a `<span>` carrying
/// [`COVERED_CLASS`] or [`MISSED_CLASS`]; uninstrumented lines pass through.
///
/// Physical line `i` (0-based) is looked up as record line
/// `i + format.first_line()`. Line count and order never change. Source
/// text is inserted verbatim; escaping is the template's job.
pub fn annotate(file: &FileCoverage, source: &str, format: Format) -> String {
    let details = &file.lines.details;
    let lines: Vec<String> = (format.first_line()..)
        .zip(source.split('\n'))
        .map(|(line, text)| {
            let class = classify_line(details, line);
            if class.is_covered() {
                wrap(COVERED_CLASS, text)
            } else if class.is_missed() {
                wrap(MISSED_CLASS, text)
            } else {
                text.to_string()
            }
        })
        .collect();
    lines.join("\n")
}

fn wrap(class: &str, text: &str) -> String {
    format!("<span class=\"{class}\">{text}</span>")
}

/// Everything the templating step needs to render one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPayload {
    pub source: String,
    pub title: String,
    pub language_hint: LanguageHint,
    /// Comma-separated covered line numbers.
    pub covered_lines: String,
    /// Comma-separated missed line numbers.
    pub missing_lines: String,
}

pub fn render_payload(file: &FileCoverage, source: &str, path: &str) -> RenderPayload {
    RenderPayload {
        source: source.to_string(),
        title: path.to_string(),
        language_hint: file_type_of(path),
        covered_lines: join_lines(&covered_lines(file)),
        missing_lines: join_lines(&missing_lines(file)),
    }
}

fn join_lines(lines: &[u32]) -> String {
    lines
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
