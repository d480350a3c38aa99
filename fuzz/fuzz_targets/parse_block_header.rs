#![no_main]

use libfuzzer_sys::fuzz_target;
use mapi_protocol::{BlockHeader, HEADER_SIZE, MAX_BLOCK_SIZE};

fuzz_target!(|data: &[u8]| {
    if data.len() >= HEADER_SIZE {
        let mut cursor = data;
        if let Ok(header) = BlockHeader::decode(&mut cursor) {
            assert!(header.payload_length() <= MAX_BLOCK_SIZE);
            assert_eq!(BlockHeader::from_bytes(header.to_bytes()), header);
        }
    }
});
