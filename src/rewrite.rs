//! Monorepo path remapping on raw report text.
//!
//! Coverage tools record paths relative to the directory they ran in. When
//! sources live under a different root, the paths are rewritten before the
//! report is parsed, so the parsed model never needs per-format mutation.
//!
//! Both transforms are plain string edits: a prefix that also occurs in
//! unrelated parts of the report is rewritten there too.

use regex::Regex;

use crate::detect::Format;
use crate::error::Result;

/// Which way [`rewrite_path`] moves the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prepend,
    Remove,
}

/// Apply `prefix` to the paths in `raw` in the given direction.
pub fn rewrite_path(raw: &str, prefix: &str, format: Format, direction: Direction) -> Result<String> {
    match direction {
        Direction::Prepend => Ok(prepend_prefix(raw, prefix, format)),
        Direction::Remove => remove_prefix(raw, prefix),
    }
}

/// Delete every literal occurrence of `prefix`.
pub fn remove_prefix(raw: &str, prefix: &str) -> Result<String> {
    if prefix.is_empty() {
        return Ok(raw.to_string());
    }
    let pattern = Regex::new(&regex::escape(prefix))?;
    Ok(pattern.replace_all(raw, "").into_owned())
}

/// Insert `prefix` in front of every path-bearing token of `format`.
pub fn prepend_prefix(raw: &str, prefix: &str, format: Format) -> String {
    if prefix.is_empty() {
        return raw.to_string();
    }
    match format {
        Format::Lcov => insert_after(raw, "SF:", prefix),
        Format::Cobertura => insert_after(raw, "filename=\"", prefix),
        // Both the class and the package carry the path; sourcefile names do not.
        Format::Jacoco => {
            let classes = insert_after(raw, "class name=\"", prefix);
            insert_after(&classes, "package name=\"", prefix)
        }
        Format::Gocover => prepend_gocover(raw, prefix),
    }
}

fn insert_after(raw: &str, anchor: &str, prefix: &str) -> String {
    raw.replace(anchor, &format!("{anchor}{prefix}"))
}

/// Go profiles have no per-record marker. Each `mode:` header starts a
/// segment; every non-empty record line after the header gets the prefix.
/// A profile with no header at all is one headerless segment.
fn prepend_gocover(raw: &str, prefix: &str) -> String {
    const HEADER: &str = "mode:";

    if !raw.contains(HEADER) {
        log::warn!("Go cover profile has no `mode:` header; prefixing every record line");
        return prefix_lines(raw.split_inclusive('\n'), prefix);
    }

    let mut segments = raw.split(HEADER);
    let mut out = String::with_capacity(raw.len());
    if let Some(first) = segments.next() {
        out.push_str(first);
    }

    for segment in segments {
        out.push_str(HEADER);
        let mut lines = segment.split_inclusive('\n');
        // Rest of the `mode:<name>` line.
        if let Some(mode) = lines.next() {
            out.push_str(mode);
        }
        out.push_str(&prefix_lines(lines, prefix));
    }

    out
}

fn prefix_lines<'a>(lines: impl Iterator<Item = &'a str>, prefix: &str) -> String {
    let mut out = String::new();
    for line in lines {
        if !line.trim().is_empty() {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    out
}
