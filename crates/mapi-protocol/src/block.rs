//! MAPI block header definitions.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// Block header size in bytes.
pub const HEADER_SIZE: usize = 2;

/// Maximum block payload size (15-bit length field).
pub const MAX_BLOCK_SIZE: usize = 32767;

/// MAPI block header.
///
/// The header is a little-endian `u16` holding `length << 1 | last`. A set
/// `last` bit marks the final block of a logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHeader {
    /// Payload length in bytes.
    pub length: u16,
    /// Whether this block terminates the logical message.
    pub last: bool,
}

impl BlockHeader {
    /// Create a block header, rejecting lengths that do not fit in 15 bits.
    pub fn new(length: usize, last: bool) -> Result<Self, ProtocolError> {
        if length > MAX_BLOCK_SIZE {
            return Err(ProtocolError::BlockTooLarge {
                size: length,
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(Self {
            length: length as u16,
            last,
        })
    }

    /// Parse a block header from bytes.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < HEADER_SIZE {
            return Err(ProtocolError::IncompleteHeader {
                actual: src.remaining(),
            });
        }

        let b0 = src.get_u8();
        let b1 = src.get_u8();
        Ok(Self::from_bytes([b0, b1]))
    }

    /// Build a header from its two raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        let length = ((bytes[0] as u16) >> 1) | ((bytes[1] as u16) << 7);
        Self {
            length,
            last: bytes[0] & 0x01 == 0x01,
        }
    }

    /// The two raw header bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let b0 = (((self.length as u32) << 1) & 0xFF) as u8 | self.last as u8;
        let b1 = (self.length >> 7) as u8;
        [b0, b1]
    }

    /// Encode the block header.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.to_bytes());
    }

    /// Payload length as `usize`.
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        self.length as usize
    }
}
