/// Parser for Go's `-coverprofile` format.
///
/// Reference: https://go.dev/blog/cover
///
/// Format:
///   mode: set|count|atomic
///   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
///
/// Each line describes a basic block (a range of source lines) with the number
/// of statements in the block and how many times it was executed. The model
/// is per line, so each block expands into one record per line in its range,
/// all carrying the block's count.
use std::collections::HashMap;

use super::CoverageParser;
use crate::detect::Format;
use crate::error::{CvrError, Result};
use crate::model::{FileCoverage, LineRecord, LineSummary};

/// Go coverage profile parser.
pub struct GocoverParser;

impl CoverageParser for GocoverParser {
    fn format(&self) -> Format {
        Format::Gocover
    }

    fn parse(&self, input: &[u8]) -> Result<Vec<FileCoverage>> {
        parse(input)
    }
}

/// A parsed block from a single line of the coverage profile.
#[derive(Debug)]
struct Block {
    start_line: u32,
    end_line: u32,
    count: u64,
}

/// Parse a single block line, returning (file_path, Block).
///
/// Format: `<file>:<startLine>.<startCol>,<endLine>.<endCol> <numStmt> <count>`
fn parse_block_line(line: &str) -> Option<(&str, Block)> {
    // The range follows the last ':' of the first token, so paths may
    // contain colons.
    let (location, tail) = line.split_once(' ')?;
    let (file, range) = location.rsplit_once(':')?;
    if file.is_empty() {
        return None;
    }

    // range = "startLine.startCol,endLine.endCol", tail = "numStmt count"
    let (start, end) = range.split_once(',')?;

    let start_line: u32 = start.split_once('.')?.0.parse().ok()?;
    let end_line: u32 = end.split_once('.')?.0.parse().ok()?;
    if end_line < start_line {
        return None;
    }

    let mut parts = tail.split_whitespace();
    let _num_stmt: u64 = parts.next()?.parse().ok()?;
    let count: u64 = parts.next()?.parse().ok()?;

    Some((
        file,
        Block {
            start_line,
            end_line,
            count,
        },
    ))
}

/// Parse Go coverage profile from raw bytes.
///
/// Files are returned in the order they first appear in the profile.
pub fn parse(input: &[u8]) -> Result<Vec<FileCoverage>> {
    let text = std::str::from_utf8(input)
        .map_err(|e| CvrError::Parse(format!("Invalid UTF-8 in Go coverage data: {e}")))?;

    // Collect blocks grouped by file path, preserving insertion order.
    let mut file_order: Vec<&str> = Vec::new();
    let mut file_blocks: HashMap<&str, Vec<Block>> = HashMap::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("mode:") {
            continue;
        }

        let (file, block) = parse_block_line(line).ok_or_else(|| {
            CvrError::Parse(format!(
                "Malformed Go coverage block on line {}: {}",
                idx + 1,
                line
            ))
        })?;
        if !file_blocks.contains_key(file) {
            file_order.push(file);
        }
        file_blocks.entry(file).or_default().push(block);
    }

    Ok(file_order
        .into_iter()
        .filter_map(|file| {
            let blocks = file_blocks.remove(file)?;
            Some(blocks_to_file_coverage(file, &blocks))
        })
        .collect())
}

/// Convert a list of blocks for one file into a `FileCoverage`.
///
/// Blocks may overlap or share a line; each line keeps the maximum count
/// of any block touching it. Ranges are inclusive on both ends, even when
/// the end column sits at the start of the last line.
fn blocks_to_file_coverage(path: &str, blocks: &[Block]) -> FileCoverage {
    let records = blocks.iter().flat_map(|block| {
        (block.start_line..=block.end_line).map(move |line| LineRecord {
            line,
            hit: block.count,
        })
    });
    FileCoverage::new(path, LineSummary::from_details(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gocover() {
        let input = include_bytes!("../../tests/fixtures/sample.gocov");
        let files = parse(input).unwrap();

        assert_eq!(files.len(), 2);

        let main = &files[0];
        assert_eq!(main.file, "github.com/user/project/main.go");
        // Lines 10-12 (count 5) + lines 14-16 (count 0) = 6 lines
        assert_eq!(main.lines.found, 6);
        assert_eq!(main.lines.hit, 3);
        assert_eq!(main.lines.details[0], LineRecord { line: 10, hit: 5 });
        assert_eq!(main.lines.details[2], LineRecord { line: 12, hit: 5 });
        assert_eq!(main.lines.details[3], LineRecord { line: 14, hit: 0 });

        let util = &files[1];
        assert_eq!(util.file, "github.com/user/project/util.go");
        assert_eq!(util.lines.details.len(), 3);
        assert_eq!(util.lines.details[0].hit, 3);
    }

    #[test]
    fn test_parse_gocover_overlapping_blocks() {
        // When two blocks overlap on the same line, we take the max hit count.
        let input = b"mode: count\n\
            example.com/pkg/f.go:5.1,10.10 3 2\n\
            example.com/pkg/f.go:8.1,12.10 2 7\n";
        let files = parse(input).unwrap();

        assert_eq!(files.len(), 1);
        let details = &files[0].lines.details;

        // Lines 5-7 from first block only: count 2
        // Lines 8-10 overlap: max(2, 7) = 7
        // Lines 11-12 from second block only: count 7
        assert_eq!(details.len(), 8); // lines 5..=12
        let hit_of = |n: u32| details.iter().find(|l| l.line == n).unwrap().hit;
        assert_eq!(hit_of(5), 2);
        assert_eq!(hit_of(8), 7);
        assert_eq!(hit_of(10), 7);
        assert_eq!(hit_of(12), 7);
    }

    #[test]
    fn test_parse_gocover_empty() {
        let files = parse(b"mode: set\n").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_parse_gocover_no_mode_header() {
        // Some merge tools produce profiles without a mode line.
        let files = parse(b"example.com/pkg/f.go:1.1,5.10 2 3\n").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].lines.details.len(), 5);
        assert_eq!(files[0].lines.details[0].hit, 3);
    }

    #[test]
    fn test_parse_gocover_malformed_block() {
        let err = parse(b"mode: set\nnot a block\n").unwrap_err();
        assert!(matches!(err, CvrError::Parse(msg) if msg.contains("line 2")));
    }

    #[test]
    fn test_parse_block_line() {
        let (file, block) = parse_block_line("github.com/user/repo/file.go:10.1,20.5 3 1").unwrap();
        assert_eq!(file, "github.com/user/repo/file.go");
        assert_eq!(block.start_line, 10);
        assert_eq!(block.end_line, 20);
        assert_eq!(block.count, 1);

        let (file, _) = parse_block_line("C:/work/main.go:1.1,2.2 1 0").unwrap();
        assert_eq!(file, "C:/work/main.go");

        assert!(parse_block_line("mode: count").is_none());
        assert!(parse_block_line("").is_none());
    }
}
