//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `CoverageReport`; the annotation and
//! badge layers only ever read it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::detect::Format;

/// Compute a coverage percentage, returning 100.0 when nothing was
/// instrumented.
#[must_use]
pub fn rate(hit: u64, found: u64) -> f64 {
    if found == 0 {
        100.0
    } else {
        hit as f64 / found as f64 * 100.0
    }
}

/// A single instrumented line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRecord {
    pub line: u32,
    pub hit: u64,
}

/// Line totals plus the per-line detail for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineSummary {
    /// Number of instrumented lines.
    pub found: u64,
    /// Number of instrumented lines executed at least once.
    pub hit: u64,
    /// One entry per instrumented line, sorted by `line`.
    pub details: Vec<LineRecord>,
}

impl LineSummary {
    /// Build a summary whose totals are derived from `details`.
    ///
    /// Duplicate line numbers collapse into one record with the max hit count.
    pub fn from_details(details: impl IntoIterator<Item = LineRecord>) -> Self {
        let details = dedup_lines(details);
        let found = details.len() as u64;
        let hit = details.iter().filter(|l| l.hit > 0).count() as u64;
        Self { found, hit, details }
    }

    /// Build a summary with totals stated by the report itself.
    /// `hit` never exceeds `found`.
    pub fn with_totals(
        details: impl IntoIterator<Item = LineRecord>,
        found: u64,
        hit: u64,
    ) -> Self {
        Self {
            found,
            hit: hit.min(found),
            details: dedup_lines(details),
        }
    }
}

fn dedup_lines(details: impl IntoIterator<Item = LineRecord>) -> Vec<LineRecord> {
    let mut by_line: BTreeMap<u32, u64> = BTreeMap::new();
    for record in details {
        let entry = by_line.entry(record.line).or_insert(0);
        *entry = (*entry).max(record.hit);
    }
    by_line
        .into_iter()
        .map(|(line, hit)| LineRecord { line, hit })
        .collect()
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCoverage {
    /// Format-native path: absolute, relative or module-qualified.
    pub file: String,
    pub lines: LineSummary,
}

impl FileCoverage {
    pub fn new(file: impl Into<String>, lines: LineSummary) -> Self {
        Self {
            file: file.into(),
            lines,
        }
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        rate(self.lines.hit, self.lines.found)
    }
}

/// The complete result of parsing one coverage report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub format: Format,
    pub files: Vec<FileCoverage>,
}

impl CoverageReport {
    pub fn new(format: Format, files: Vec<FileCoverage>) -> Self {
        Self { format, files }
    }

    #[must_use]
    pub fn percent(&self) -> f64 {
        percent(&self.files)
    }

    pub fn find_file(&self, path: &str) -> Option<&FileCoverage> {
        find_file(&self.files, path)
    }

    pub fn sort_by_path(&mut self) {
        sort_by_path(&mut self.files);
    }
}

/// Aggregate line coverage across `files`: `sum(hit) / sum(found) * 100`,
/// or 100 when no line was instrumented at all.
#[must_use]
pub fn percent(files: &[FileCoverage]) -> f64 {
    let (found, hit) = files.iter().fold((0u64, 0u64), |(found, hit), f| {
        (found + f.lines.found, hit + f.lines.hit)
    });
    rate(hit, found)
}

/// Stable sort by directory name, then by file basename.
pub fn sort_by_path(files: &mut [FileCoverage]) {
    files.sort_by(|a, b| compare_paths(&a.file, &b.file));
}

fn compare_paths(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (a_dir, a_base) = split_path(a);
    let (b_dir, b_base) = split_path(b);
    a_dir.cmp(b_dir).then_with(|| a_base.cmp(b_base))
}

fn split_path(path: &str) -> (&str, &str) {
    let p = Path::new(path);
    let dir = p.parent().and_then(|d| d.to_str()).unwrap_or("");
    let base = p.file_name().and_then(|n| n.to_str()).unwrap_or(path);
    (dir, base)
}

/// Exact match on `file`; the first match wins when a report lists a path twice.
pub fn find_file<'a>(files: &'a [FileCoverage], path: &str) -> Option<&'a FileCoverage> {
    files.iter().find(|f| f.file == path)
}

/// How a single record line was treated by the test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineClassification {
    /// The line was instrumented.
    pub active: bool,
    /// Execution count, `None` for uninstrumented lines.
    pub hit: Option<u64>,
}

impl LineClassification {
    pub fn is_covered(&self) -> bool {
        self.hit.is_some_and(|h| h > 0)
    }

    pub fn is_missed(&self) -> bool {
        self.hit == Some(0)
    }
}

/// Look up `line` in `details`, which must be sorted by line as
/// [`LineSummary`] keeps them. The caller maps physical source lines to
/// record lines (see [`Format::first_line`]).
pub fn classify_line(details: &[LineRecord], line: u32) -> LineClassification {
    match details.binary_search_by_key(&line, |record| record.line) {
        Ok(idx) => LineClassification {
            active: true,
            hit: Some(details[idx].hit),
        },
        Err(_) => LineClassification {
            active: false,
            hit: None,
        },
    }
}

/// Instrumented lines executed at least once.
pub fn covered_lines(file: &FileCoverage) -> Vec<u32> {
    file.lines
        .details
        .iter()
        .filter(|l| l.hit > 0)
        .map(|l| l.line)
        .collect()
}

/// Instrumented lines never executed.
pub fn missing_lines(file: &FileCoverage) -> Vec<u32> {
    file.lines
        .details
        .iter()
        .filter(|l| l.hit == 0)
        .map(|l| l.line)
        .collect()
}
