//! Property tests for the block framing law.
//!
//! Bytes written through one `MapiStream` in arbitrary chunks and then
//! flushed must read back unchanged on the peer, followed only by the
//! message terminator.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use futures_util::StreamExt;
use mapi_codec::{BlockReader, MapiStream};
use mapi_protocol::MAX_BLOCK_SIZE;
use proptest::prelude::*;
use tokio::io::{AsyncReadExt, DuplexStream};

fn expected_suffix(data: &[u8]) -> &'static [u8] {
    if !data.is_empty() && !data.ends_with(b"\n") {
        b"\n.\n"
    } else {
        b".\n"
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

async fn write_chunked(stream: &mut MapiStream<DuplexStream>, data: &[u8], chunks: &[usize]) {
    let mut rest = data;
    let mut sizes = chunks.iter().cycle();
    while !rest.is_empty() {
        let n = (*sizes.next().unwrap()).min(rest.len());
        stream.write_bytes(&rest[..n]).await.unwrap();
        rest = &rest[n..];
    }
    stream.flush_message().await.unwrap();
    stream.close().await.unwrap();
}

/// Bytes read back through a `MapiStream` peer.
fn read_back(data: &[u8], chunks: &[usize]) -> Vec<u8> {
    let (data, chunks) = (data.to_vec(), chunks.to_vec());
    runtime().block_on(async move {
        let (a, b) = tokio::io::duplex(1024);
        let writer = tokio::spawn(async move {
            write_chunked(&mut MapiStream::new(a), &data, &chunks).await;
        });

        let mut out = Vec::new();
        MapiStream::new(b).read_to_end(&mut out).await.unwrap();
        writer.await.unwrap();
        out
    })
}

/// `(length, last)` of every block that went over the wire.
fn wire_blocks(data: &[u8], chunks: &[usize]) -> Vec<(usize, bool)> {
    let (data, chunks) = (data.to_vec(), chunks.to_vec());
    runtime().block_on(async move {
        let (a, b) = tokio::io::duplex(1024);
        let writer = tokio::spawn(async move {
            write_chunked(&mut MapiStream::new(a), &data, &chunks).await;
        });

        let mut reader = BlockReader::new(b);
        let mut blocks = Vec::new();
        while let Some(block) = reader.next().await {
            let block = block.unwrap();
            blocks.push((block.len(), block.last));
        }
        writer.await.unwrap();
        blocks
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn framing_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 0..100_000),
        chunks in proptest::collection::vec(1usize..40_000, 1..8),
    ) {
        let mut expected = data.clone();
        expected.extend_from_slice(expected_suffix(&data));
        prop_assert_eq!(read_back(&data, &chunks), expected);
    }

    #[test]
    fn blocks_never_exceed_header_range(
        len in 0usize..120_000,
        chunks in proptest::collection::vec(1usize..70_000, 1..4),
    ) {
        let data = vec![b'a'; len];
        let blocks = wire_blocks(&data, &chunks);

        let (last, full) = blocks.split_last().unwrap();
        prop_assert!(last.1);
        prop_assert!(last.0 < MAX_BLOCK_SIZE);
        for block in full {
            prop_assert_eq!(*block, (MAX_BLOCK_SIZE, false));
        }
        prop_assert_eq!(blocks.iter().map(|b| b.0).sum::<usize>(), len);
    }
}

#[test]
fn block_size_multiples_end_with_bare_prompt() {
    for len in [MAX_BLOCK_SIZE, 2 * MAX_BLOCK_SIZE] {
        let data = vec![b'a'; len];
        let out = read_back(&data, &[len]);

        assert_eq!(out.len(), len + 3);
        assert_eq!(&out[len..], b"\n.\n");
        assert_eq!(wire_blocks(&data, &[len]).last(), Some(&(0, true)));
    }
}

#[test]
fn block_size_multiple_ending_in_newline() {
    let mut data = vec![b'a'; MAX_BLOCK_SIZE - 1];
    data.push(b'\n');
    let out = read_back(&data, &[MAX_BLOCK_SIZE]);

    assert_eq!(&out[..MAX_BLOCK_SIZE], &data[..]);
    assert_eq!(&out[MAX_BLOCK_SIZE..], b".\n");
}
