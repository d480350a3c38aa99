//! Client error types.

use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The server stopped answering during the handshake.
    #[error("Connection to the server was lost")]
    ConnectionLost,

    /// The stream ended in the middle of a response.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Challenge/response negotiation failed.
    #[error("authentication failed: {0}")]
    Authentication(#[from] mapi_auth::AuthError),

    /// Malformed challenge or response line.
    #[error("protocol error: {0}")]
    Protocol(#[from] mapi_protocol::ProtocolError),

    /// Block framing or transport error.
    #[error("codec error: {0}")]
    Codec(#[from] mapi_codec::CodecError),

    /// Server returned an error (`!` line).
    #[error("{message}")]
    Server {
        /// The error line without its leading `!`.
        message: String,
    },

    /// A field could not be converted to the requested type.
    #[error("type error: {0}")]
    Type(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection timeout occurred.
    #[error("connection timed out")]
    ConnectTimeout,

    /// Too many redirects during connection.
    #[error("too many redirects (max {max})")]
    TooManyRedirects {
        /// Maximum redirects allowed.
        max: u8,
    },

    /// A redirect URL could not be understood.
    #[error("invalid redirect {0}")]
    InvalidRedirect(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is transient and may succeed on retry.
    ///
    /// Transient errors include timeouts and lost connections. Negotiation
    /// and server errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectTimeout | Self::ConnectionLost | Self::Io(_) => true,
            Self::Codec(e) => e.is_io(),
            _ => false,
        }
    }

    /// Check if this error indicates a malformed exchange with the server.
    ///
    /// After a protocol error the connection is unusable.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Codec(_) | Self::UnexpectedEof
        )
    }

    /// Check if the server reported this error.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// The server message, if this is a server error.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message } => Some(message),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
