//! # mapi-protocol
//!
//! Pure implementation of the MAPI wire protocol spoken by MonetDB servers.
//!
//! MAPI is line oriented on top of a simple block framing: every logical
//! message is split into blocks of at most 32767 bytes, each preceded by a
//! two byte header carrying the length and a "last block" flag. Inside a
//! message, each line starts with a sigil that tells the client what kind of
//! line it is looking at.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking logic and
//! makes no assumptions about the async runtime. `mapi-codec` builds the async
//! framing on top of [`BlockHeader`], and `mapi-client` drives the line parsers
//! in [`result`] from a live connection.
//!
//! ## Example
//!
//! ```rust
//! use mapi_protocol::{BlockHeader, LineType};
//!
//! let header = BlockHeader::new(5, true).unwrap();
//! assert_eq!(header.to_bytes(), [0x0B, 0x00]);
//!
//! assert_eq!(LineType::from_line("&1 0 1 1 1"), LineType::ResultHeader);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod block;
pub mod challenge;
pub mod error;
pub mod line;
pub mod result;
pub mod types;

pub use block::{BlockHeader, HEADER_SIZE, MAX_BLOCK_SIZE};
pub use challenge::{Challenge, MIN_CHALLENGE_TOKENS};
pub use error::ProtocolError;
pub use line::{LineType, PROMPT_LINE};
pub use result::{
    ColumnInfo, NULL_LITERAL, QueryKind, ResultHeader, parse_metadata_line, parse_tuple_line,
};
pub use types::ColumnType;
