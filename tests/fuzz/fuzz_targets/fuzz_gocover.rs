#![no_main]
use libfuzzer_sys::fuzz_target;

use cvr::parsers::CoverageParser;

fuzz_target!(|data: &[u8]| {
    // Parser must not panic on any input.
    let _ = cvr::parsers::gocover::GocoverParser.parse(data);
});
