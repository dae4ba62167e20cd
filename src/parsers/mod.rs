pub mod cobertura;
pub mod gocover;
pub mod jacoco;
pub mod lcov;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

use crate::detect::Format;
use crate::error::{CvrError, Result};
use crate::model::{CoverageReport, FileCoverage};

/// Every format parser implements this trait.
pub trait CoverageParser {
    /// The format this parser understands.
    fn format(&self) -> Format;

    /// Parse the input bytes into per-file coverage records, in report order.
    fn parse(&self, input: &[u8]) -> Result<Vec<FileCoverage>>;
}

/// The parser responsible for `format`.
pub fn parser_for(format: Format) -> &'static dyn CoverageParser {
    match format {
        Format::Lcov => &lcov::LcovParser,
        Format::Cobertura => &cobertura::CoberturaParser,
        Format::Jacoco => &jacoco::JacocoParser,
        Format::Gocover => &gocover::GocoverParser,
    }
}

/// Parse `content` as `format`. Parser errors are returned as-is.
pub fn parse(content: &[u8], format: Format) -> Result<CoverageReport> {
    let files = parser_for(format).parse(content)?;
    log::debug!("parsed {} file(s) from {} report", files.len(), format);
    Ok(CoverageReport::new(format, files))
}

/// Parse `content` using a textual format tag such as `"lcov"`.
///
/// Unknown tags fail with [`CvrError::UnsupportedFormat`].
pub fn parse_str(content: &str, tag: &str) -> Result<CoverageReport> {
    let format: Format = tag.parse()?;
    parse(content.as_bytes(), format)
}

fn xml_reader(input: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader
}

fn xml_err(source: quick_xml::Error, reader: &Reader<&[u8]>) -> CvrError {
    CvrError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Unescaped value of attribute `key`, if present.
fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_for_matches_format() {
        for format in Format::ALL {
            assert_eq!(parser_for(format).format(), format);
        }
    }

    #[test]
    fn test_parse_str_unknown_tag() {
        let err = parse_str("SF:a\nend_of_record\n", "clover").unwrap_err();
        assert!(matches!(err, CvrError::UnsupportedFormat(tag) if tag == "clover"));
    }

    #[test]
    fn test_parse_str_dispatches() {
        let report = parse_str("SF:a.js\nDA:1,1\nend_of_record\n", "lcov").unwrap();
        assert_eq!(report.format, Format::Lcov);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].file, "a.js");
    }
}
