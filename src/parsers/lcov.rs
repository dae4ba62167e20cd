/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records used:
///   TN:<test name>
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// Function and branch records (FN, FNDA, BRDA, ...) are skipped.
use super::CoverageParser;
use crate::detect::Format;
use crate::error::{CvrError, Result};
use crate::model::{FileCoverage, LineRecord, LineSummary};

/// LCOV format parser.
pub struct LcovParser;

impl CoverageParser for LcovParser {
    fn format(&self) -> Format {
        Format::Lcov
    }

    fn parse(&self, input: &[u8]) -> Result<Vec<FileCoverage>> {
        parse(input)
    }
}

/// State for the record currently being read.
struct Record {
    file: String,
    details: Vec<LineRecord>,
    found: Option<u64>,
    hit: Option<u64>,
}

impl Record {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            details: Vec::new(),
            found: None,
            hit: None,
        }
    }

    fn finish(self) -> FileCoverage {
        let lines = match (self.found, self.hit) {
            (None, None) => LineSummary::from_details(self.details),
            (found, hit) => {
                let derived = LineSummary::from_details(self.details);
                LineSummary::with_totals(
                    derived.details,
                    found.unwrap_or(derived.found),
                    hit.unwrap_or(derived.hit),
                )
            }
        };
        FileCoverage::new(self.file, lines)
    }
}

/// Parse LCOV coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<Vec<FileCoverage>> {
    let text = std::str::from_utf8(input)
        .map_err(|e| CvrError::Parse(format!("Invalid UTF-8 in LCOV data: {e}")))?;

    let mut files = Vec::new();
    let mut current: Option<Record> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(record) = current.take() {
                files.push(record.finish());
            }
            continue;
        }

        // Split on first ':'
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };

        match tag {
            "SF" => {
                // A new SF without end_of_record closes the previous record.
                if let Some(record) = current.replace(Record::new(value)) {
                    files.push(record.finish());
                }
            }
            "DA" => {
                if let Some(record) = current.as_mut() {
                    if let Some(line_record) = parse_da(value, idx + 1)? {
                        record.details.push(line_record);
                    }
                }
            }
            "LF" => {
                if let Some(record) = current.as_mut() {
                    record.found = Some(parse_total(tag, value, idx + 1)?);
                }
            }
            "LH" => {
                if let Some(record) = current.as_mut() {
                    record.hit = Some(parse_total(tag, value, idx + 1)?);
                }
            }
            // TN, FN, FNDA, FNF, FNH, BRDA, BRF, BRH
            _ => {}
        }
    }

    // Handle case where file ends without end_of_record
    if let Some(record) = current.take() {
        files.push(record.finish());
    }

    Ok(files)
}

/// DA:<line_number>,<execution_count>[,<checksum>]
///
/// Some instrumenters use negative counts (e.g. -1) to mark lines that are
/// not instrumentable; those yield `None`.
fn parse_da(value: &str, line_no: usize) -> Result<Option<LineRecord>> {
    let mut parts = value.splitn(3, ',');
    let line = parts
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| CvrError::Parse(format!("Malformed DA record on line {line_no}: {value}")))?;
    let count = parts
        .next()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| CvrError::Parse(format!("Malformed DA record on line {line_no}: {value}")))?;

    if count < 0 {
        return Ok(None);
    }
    Ok(Some(LineRecord {
        line,
        hit: count as u64,
    }))
}

fn parse_total(tag: &str, value: &str, line_no: usize) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        CvrError::Parse(format!("Malformed {tag} record on line {line_no}: {value}"))
    })
}
