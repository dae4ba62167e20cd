/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="..." line-rate="...">
///             <methods>
///               <method name="...">
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"/>
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Each `<class>` becomes one `FileCoverage` whose path is the `filename`
/// attribute exactly as written; `<source>` roots are not applied.
use quick_xml::events::Event;

use super::{get_attr, xml_err, xml_reader, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::{FileCoverage, LineRecord, LineSummary};

pub struct CoberturaParser;

impl CoverageParser for CoberturaParser {
    fn format(&self) -> Format {
        Format::Cobertura
    }

    fn parse(&self, input: &[u8]) -> Result<Vec<FileCoverage>> {
        parse(input)
    }
}

/// A `<class>` element being collected.
struct OpenClass {
    filename: String,
    lines: Vec<LineRecord>,
}

impl OpenClass {
    fn finish(self) -> FileCoverage {
        // Lines may appear under both <method><lines> and <class><lines>;
        // from_details keeps one record per line with the max hit count.
        FileCoverage::new(self.filename, LineSummary::from_details(self.lines))
    }
}

/// Parse Cobertura XML coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<Vec<FileCoverage>> {
    let mut reader = xml_reader(input);
    let mut buf = Vec::new();

    let mut files = Vec::new();
    let mut current: Option<OpenClass> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"class" => {
                    if let Some(filename) = get_attr(e, b"filename") {
                        let class = OpenClass {
                            filename,
                            lines: Vec::new(),
                        };
                        if is_start_event {
                            current = Some(class);
                        } else {
                            // <class .../> with no lines still names an instrumented file.
                            files.push(class.finish());
                        }
                    }
                }
                b"line" => {
                    if let Some(class) = current.as_mut() {
                        let number = get_attr(e, b"number").and_then(|n| n.parse::<u32>().ok());
                        if let Some(line) = number {
                            let hit = get_attr(e, b"hits")
                                .and_then(|h| h.parse::<u64>().ok())
                                .unwrap_or(0);
                            class.lines.push(LineRecord { line, hit });
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"class" {
                    if let Some(class) = current.take() {
                        files.push(class.finish());
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    // Handle unclosed class
    if let Some(class) = current.take() {
        files.push(class.finish());
    }

    Ok(files)
}
