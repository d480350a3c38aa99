//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while answering a server challenge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The challenge carries fewer tokens than the protocol version needs.
    #[error(
        "Challenge string is not valid, it must contain at least {minimum} tokens (got {actual})"
    )]
    TooFewTokens {
        /// Tokens required by the protocol version.
        minimum: usize,
        /// Tokens actually present.
        actual: usize,
    },

    /// The server speaks a protocol version this client does not implement.
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u32),

    /// None of the algorithms offered by the server is supported.
    #[error("No supported hashes in {0}")]
    NoSupportedHashes(String),

    /// The password pre-hash algorithm named by the server is not available.
    #[error("Hashing algorithm {0} is not supported")]
    UnsupportedHash(String),
}

impl AuthError {
    /// Negotiation failures never go away on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        false
    }
}
