//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while decoding or validating MAPI wire data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Fewer than two bytes were available for a block header.
    #[error("invalid block header length: expected 2 bytes, got {actual}")]
    IncompleteHeader {
        /// Number of bytes that were available.
        actual: usize,
    },

    /// A block payload exceeded the 15-bit length field.
    #[error("block too large: {size} bytes (max {max})")]
    BlockTooLarge {
        /// Requested payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// The server challenge did not carry enough tokens to be usable.
    #[error("Server challenge unusable! Challenge contains too few tokens: {0}")]
    TooFewTokens(String),

    /// The protocol version token of the challenge is not a number.
    #[error("Unknown Mapi protocol {0}")]
    UnknownProtocol(String),

    /// A `&` result header line could not be parsed.
    #[error("invalid result header: {0}")]
    InvalidResultHeader(String),

    /// A `%` column metadata line could not be parsed.
    #[error("invalid column metadata line: {0}")]
    InvalidMetadata(String),
}
