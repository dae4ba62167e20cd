use std::path::Path;

use crate::detect::{detect_format, Format};
use crate::error::{CvrError, Result};
use crate::model::CoverageReport;
use crate::parsers;
use crate::rewrite::{rewrite_path, Direction};

/// A path prefix to apply to a report before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remap {
    pub prefix: String,
    pub direction: Direction,
}

impl Remap {
    pub fn prepend(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            direction: Direction::Prepend,
        }
    }

    pub fn strip(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            direction: Direction::Remove,
        }
    }
}

/// The override if given, otherwise the detected format of `content`.
pub fn resolve_format(path: &Path, content: &[u8], format_override: Option<&str>) -> Result<Format> {
    match format_override {
        Some(tag) => tag.parse(),
        None => detect_format(path, content)
            .ok_or_else(|| CvrError::UnknownFormat(path.display().to_string())),
    }
}

/// Read a coverage file, resolve its format, optionally remap its paths,
/// and parse it.
pub fn ingest(
    file_path: &Path,
    format_override: Option<&str>,
    remap: Option<&Remap>,
) -> Result<CoverageReport> {
    let content = std::fs::read(file_path)?;
    let format = resolve_format(file_path, &content, format_override)?;
    log::debug!("reading {} as {format}", file_path.display());

    match remap {
        Some(remap) => {
            let text = String::from_utf8(content).map_err(|e| {
                CvrError::Parse(format!("{} is not UTF-8: {e}", file_path.display()))
            })?;
            ingest_str(&text, format, Some(remap))
        }
        None => parsers::parse(&content, format),
    }
}

/// Remap (if asked) and parse report text already in memory.
pub fn ingest_str(content: &str, format: Format, remap: Option<&Remap>) -> Result<CoverageReport> {
    match remap {
        Some(remap) => {
            let rewritten = rewrite_path(content, &remap.prefix, format, remap.direction)?;
            parsers::parse(rewritten.as_bytes(), format)
        }
        None => parsers::parse(content.as_bytes(), format),
    }
}
