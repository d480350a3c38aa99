//! # mapi-codec
//!
//! Async framing layer for MAPI blocks.
//!
//! This crate turns a raw byte transport into the logical, line oriented
//! message stream the MonetDB protocol is spoken over. Outgoing bytes are
//! cut into blocks of at most 32767 bytes, and incoming blocks are reassembled
//! until the block flagged as last arrives.
//!
//! ## Architecture
//!
//! ```text
//! TCP Stream → BlockCodec (block framing) → MessageBuffer → MapiStream → Client
//! ```
//!
//! [`MapiStream`] is a duplex stream: it implements tokio's `AsyncRead` and
//! `AsyncWrite`, and additionally offers line based helpers used by the
//! client. Every logical message read through it ends with a bare `.` line,
//! appended after the final block.
//!
//! ```rust,ignore
//! use mapi_codec::MapiStream;
//!
//! let mut stream = MapiStream::new(tcp_stream);
//! let challenge = stream.read_line().await?;
//! stream.write_line("LIT:monetdb:{SHA1}...:sql:demo:").await?;
//! stream.flush_message().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod block_codec;
pub mod error;
pub mod framed;
pub mod message;
pub mod stream;

pub use block_codec::{Block, BlockCodec};
pub use error::CodecError;
pub use framed::{BlockReader, BlockWriter};
pub use message::MessageBuffer;
pub use stream::MapiStream;
