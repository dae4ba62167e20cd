/// Parser for JaCoCo XML coverage reports.
///
/// JaCoCo XML structure:
///   <report name="...">
///     <sessioninfo id="..." start="..." dump="..."/>
///     <package name="com/example">
///       <class name="com/example/Foo" sourcefilename="Foo.java">
///         <method name="doStuff" desc="()V" line="10">...</method>
///       </class>
///       <sourcefile name="Foo.java">
///         <line nr="10" mi="0" ci="3" mb="0" cb="2"/>
///         <counter type="LINE" missed="1" covered="5"/>
///       </sourcefile>
///     </package>
///   </report>
///
/// Line data lives inside `<sourcefile>`. Each `<line>` carries `nr` (line
/// number) and `mi`/`ci` (missed/covered instructions). There is no hit
/// count, so `ci` stands in for it. Paths are built from the package name
/// plus the source file name.
use quick_xml::events::Event;

use super::{get_attr, xml_err, xml_reader, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::{FileCoverage, LineRecord, LineSummary};

/// JaCoCo XML format parser.
pub struct JacocoParser;

impl CoverageParser for JacocoParser {
    fn format(&self) -> Format {
        Format::Jacoco
    }

    fn parse(&self, input: &[u8]) -> Result<Vec<FileCoverage>> {
        parse(input)
    }
}

/// Parse JaCoCo XML coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<Vec<FileCoverage>> {
    let mut reader = xml_reader(input);
    let mut buf = Vec::new();

    let mut files = Vec::new();
    let mut current_package: Option<String> = None;
    let mut current_sourcefile: Option<(String, Vec<LineRecord>)> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"package" if is_start_event => {
                    current_package = get_attr(e, b"name");
                }
                b"sourcefile" => {
                    if let Some(name) = get_attr(e, b"name") {
                        let package = current_package.as_deref().map(|p| p.trim_end_matches('/'));
                        let path = match package {
                            Some(pkg) if !pkg.is_empty() => format!("{}/{}", pkg, name),
                            _ => name,
                        };
                        if is_start_event {
                            current_sourcefile = Some((path, Vec::new()));
                        } else {
                            files.push(FileCoverage::new(path, LineSummary::default()));
                        }
                    }
                }
                b"line" => {
                    if let Some((_, lines)) = current_sourcefile.as_mut() {
                        if let Some(record) = line_record(e) {
                            lines.push(record);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"package" => {
                    current_package = None;
                }
                b"sourcefile" => {
                    if let Some((path, lines)) = current_sourcefile.take() {
                        files.push(FileCoverage::new(path, LineSummary::from_details(lines)));
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    // Handle unclosed sourcefile
    if let Some((path, lines)) = current_sourcefile.take() {
        files.push(FileCoverage::new(path, LineSummary::from_details(lines)));
    }

    Ok(files)
}

/// A line is instrumented when it holds at least one instruction
/// (`ci + mi > 0`); comment and blank lines report zero for both.
fn line_record(e: &quick_xml::events::BytesStart) -> Option<LineRecord> {
    let count = |key: &[u8]| -> u64 {
        get_attr(e, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };
    let line = get_attr(e, b"nr")?.parse::<u32>().ok()?;
    let ci = count(b"ci");
    let mi = count(b"mi");
    if ci == 0 && mi == 0 {
        return None;
    }
    Some(LineRecord { line, hit: ci })
}
