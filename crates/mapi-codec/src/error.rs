//! Codec error types.

use std::io;
use std::time::Duration;

use mapi_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the block framing layer.
///
/// Every variant leaves the connection in an unknown framing state, so the
/// caller has to discard it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Transport I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A block header was malformed or could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The transport ended in the middle of a block payload.
    #[error("truncated block: expected {expected} bytes, got {actual}")]
    TruncatedBlock {
        /// Length announced by the block header.
        expected: usize,
        /// Bytes that actually arrived.
        actual: usize,
    },

    /// The transport closed before the last block of a message arrived.
    #[error("connection closed in the middle of a message")]
    ConnectionClosed,

    /// No block arrived within the configured read timeout.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
}

impl CodecError {
    /// Whether this error was caused by the transport rather than malformed data.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed | Self::Timeout(_))
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Timeout(_) => io::Error::new(io::ErrorKind::TimedOut, err),
            CodecError::ConnectionClosed => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
