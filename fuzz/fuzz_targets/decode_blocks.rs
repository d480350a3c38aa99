#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mapi_codec::{BlockCodec, MessageBuffer};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = BlockCodec::new();
    let mut src = BytesMut::from(data);
    let mut message = MessageBuffer::new();

    // Decode until the input runs out or a frame is rejected
    while let Ok(Some(block)) = codec.decode(&mut src) {
        message.push(block);
        while let Some(line) = message.next_line() {
            let _ = line.len();
        }
    }
});
