//! MAPI block codec implementation.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mapi_protocol::block::{BlockHeader, HEADER_SIZE};
use mapi_protocol::ProtocolError;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// A single MAPI block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Whether this block ends the logical message.
    pub last: bool,
    /// Block payload (excluding header).
    pub payload: Bytes,
}

impl Block {
    /// Create a new block.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>, last: bool) -> Self {
        Self {
            last,
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Size on the wire, header included.
    #[must_use]
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// MAPI block codec for tokio-util framing.
///
/// Decoding waits until the header and the full payload are buffered, so
/// short transport reads are simply retried by the framed reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCodec;

impl BlockCodec {
    /// Create a new block codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for BlockCodec {
    type Item = Block;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = BlockHeader::from_bytes([src[0], src[1]]);
        let length = header.payload_length();

        if src.len() < HEADER_SIZE + length {
            src.reserve(HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(length).freeze();

        tracing::trace!(length = length, last = header.last, "decoded MAPI block");

        Ok(Some(Block::new(payload, header.last)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(block) = self.decode(src)? {
            return Ok(Some(block));
        }

        match src.len() {
            0 => Ok(None),
            n if n < HEADER_SIZE => {
                src.clear();
                Err(ProtocolError::IncompleteHeader { actual: n }.into())
            }
            n => {
                let header = BlockHeader::from_bytes([src[0], src[1]]);
                src.clear();
                Err(CodecError::TruncatedBlock {
                    expected: header.payload_length(),
                    actual: n - HEADER_SIZE,
                })
            }
        }
    }
}

impl Encoder<Block> for BlockCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Block, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = BlockHeader::new(item.payload.len(), item.last)?;

        dst.reserve(item.total_size());
        header.encode(dst);
        dst.put_slice(&item.payload);

        tracing::trace!(
            length = item.payload.len(),
            last = item.last,
            "encoded MAPI block"
        );

        Ok(())
    }
}
