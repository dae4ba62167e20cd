/// Coverage format tags and auto-detection.
///
/// Strategy:
///   1. Check file extension for strong hints
///   2. Peek at the first bytes of the file content
///   3. Fall back to CLI --format override (handled by caller)
use std::path::Path;

use serde::Serialize;

use crate::error::CvrError;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Lcov,
    Cobertura,
    Jacoco,
    Gocover,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Format::Lcov,
        Format::Cobertura,
        Format::Jacoco,
        Format::Gocover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Lcov => "lcov",
            Format::Cobertura => "cobertura",
            Format::Jacoco => "jacoco",
            Format::Gocover => "gocover",
        }
    }

    /// The record line number the tool writes for the first physical line
    /// of a source file.
    ///
    /// Parsers keep line numbers exactly as the report states them, so the
    /// physical (0-based) index `i` of a source line maps to record line
    /// `i + first_line()`.
    pub fn first_line(&self) -> u32 {
        match self {
            // DA:<line>,<count> counts from 1 (geninfo).
            Format::Lcov => 1,
            // <line number="..."> counts from 1.
            Format::Cobertura => 1,
            // <line nr="..."> counts from 1.
            Format::Jacoco => 1,
            // Block ranges `startLine.col,endLine.col` count from 1.
            Format::Gocover => 1,
        }
    }
}

impl std::str::FromStr for Format {
    type Err = CvrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lcov" => Ok(Format::Lcov),
            "cobertura" => Ok(Format::Cobertura),
            "jacoco" => Ok(Format::Jacoco),
            "gocover" => Ok(Format::Gocover),
            _ => Err(CvrError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the coverage format from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    // 1. Try extension-based detection
    if let Some(fmt) = detect_by_extension(path) {
        return Some(fmt);
    }

    // 2. Content-based detection
    detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "info" | "lcov" => Some(Format::Lcov),
        "coverprofile" | "gocov" => Some(Format::Gocover),
        // .xml could be Cobertura or JaCoCo; content decides.
        _ => None,
    }
}

fn detect_by_content(content: &[u8]) -> Option<Format> {
    let head_len = content.len().min(4096);
    let head = String::from_utf8_lossy(&content[..head_len]);

    // Tags must start a line to avoid matching files that merely mention them.
    let has_sf = head.lines().any(|l| l.starts_with("SF:"));
    let has_da = head.lines().any(|l| l.starts_with("DA:"));
    if has_sf && has_da {
        return Some(Format::Lcov);
    }

    if head
        .lines()
        .next()
        .is_some_and(|first| first.trim_start().starts_with("mode:"))
    {
        return Some(Format::Gocover);
    }

    let trimmed = head.trim_start();
    if trimmed.starts_with("<?xml") || trimmed.starts_with('<') {
        // JaCoCo's root element is <report>; Cobertura's is <coverage>.
        if head.contains("<report") {
            return Some(Format::Jacoco);
        }
        if head.contains("<coverage") {
            return Some(Format::Cobertura);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_lcov_by_extension() {
        assert_eq!(detect_format(Path::new("coverage.info"), b""), Some(Format::Lcov));
        assert_eq!(detect_format(Path::new("coverage.lcov"), b""), Some(Format::Lcov));
    }

    #[test]
    fn test_detect_lcov_by_content() {
        let content = b"TN:test\nSF:/src/lib.rs\nDA:1,5\nend_of_record\n";
        assert_eq!(
            detect_format(Path::new("coverage.txt"), content),
            Some(Format::Lcov)
        );
    }

    #[test]
    fn test_detect_gocover() {
        assert_eq!(
            detect_format(Path::new("cover.gocov"), b""),
            Some(Format::Gocover)
        );
        assert_eq!(
            detect_format(Path::new("cover.out"), b"mode: atomic\nx.go:1.1,2.2 1 1\n"),
            Some(Format::Gocover)
        );
    }

    #[test]
    fn test_detect_xml_formats() {
        let cobertura = b"<?xml version=\"1.0\"?>\n<coverage version=\"1.0\">";
        assert_eq!(
            detect_format(Path::new("coverage.xml"), cobertura),
            Some(Format::Cobertura)
        );

        let jacoco = br#"<?xml version="1.0"?><!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd"><report name="t">"#;
        assert_eq!(
            detect_format(Path::new("jacoco.xml"), jacoco),
            Some(Format::Jacoco)
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_format(Path::new("random.dat"), b"hello world"), None);
    }

    #[test]
    fn test_format_tags() {
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>().unwrap(), format);
        }
        assert_eq!("LCOV".parse::<Format>().unwrap(), Format::Lcov);

        let err = "clover".parse::<Format>().unwrap_err();
        assert!(matches!(err, CvrError::UnsupportedFormat(ref tag) if tag == "clover"));
    }
}
