#![no_main]
use libfuzzer_sys::fuzz_target;

use cvr::detect::Format;
use cvr::rewrite::{rewrite_path, Direction};

fuzz_target!(|data: &[u8]| {
    // First line is the prefix, the rest is the report. Neither direction
    // may panic for any format.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (prefix, raw) = text.split_once('\n').unwrap_or((text, ""));
    for format in Format::ALL {
        let _ = rewrite_path(raw, prefix, format, Direction::Prepend);
        let _ = rewrite_path(raw, prefix, format, Direction::Remove);
    }
});
