#![no_main]

use libfuzzer_sys::fuzz_target;
use mapi_protocol::{ColumnInfo, LineType, ResultHeader, parse_tuple_line};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut metadata = Vec::new();
    for line in text.lines() {
        match LineType::from_line(line) {
            LineType::ResultHeader => {
                let _ = ResultHeader::parse(line);
            }
            LineType::Header => metadata.push(line),
            LineType::Tuple => {
                let _ = parse_tuple_line(line);
            }
            _ => {}
        }
    }

    let _ = ColumnInfo::from_metadata(&metadata);
});
