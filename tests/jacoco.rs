mod common;

use cvr::detect::Format;
use cvr::error::CvrError;
use cvr::model::{covered_lines, missing_lines};
use cvr::parsers::parse_str;

#[test]
fn parse_sample_report() {
    let report = parse_str(&common::fixture("sample_jacoco.xml"), "jacoco").unwrap();
    assert_eq!(report.format, Format::Jacoco);

    let foo = report.find_file("com/example/Foo.java").unwrap();
    assert_eq!(foo.lines.found, 5);
    assert_eq!(foo.lines.hit, 4);
    // Line 13 has no instructions at all.
    assert_eq!(covered_lines(foo), vec![3, 10, 11, 15]);
    assert_eq!(missing_lines(foo), vec![12]);

    let bar = report.find_file("com/example/Bar.java").unwrap();
    assert_eq!(bar.lines.found, 2);
    assert_eq!(bar.lines.hit, 1);
}

#[test]
fn malformed_report_reports_position() {
    let err = parse_str(&common::fixture("malformed_jacoco.xml"), "jacoco").unwrap_err();
    assert!(matches!(err, CvrError::Xml { .. }));
    assert!(err.to_string().contains("position"));
}
