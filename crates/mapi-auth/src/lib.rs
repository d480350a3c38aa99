//! # mapi-auth
//!
//! Challenge/response authentication for MonetDB's MAPI protocol.
//!
//! The server opens every connection with a challenge naming a salt, its
//! server type, the protocol version and the hash algorithms it accepts. The
//! client answers with a single line carrying the hashed password. How that
//! line is built depends on the protocol version:
//!
//! | Version | Password hash | Preference | Byte order |
//! |---------|---------------|------------|------------|
//! | 8 | `{ALG}` + upper hex of `ALG(password + salt)` | SHA1, MD5, plain | always `LIT` |
//! | 9 | `{ALG}` + lower hex of `ALG(H(pw) + salt)` | SHA512, SHA384, SHA256, SHA1, MD5 | native |
//!
//! ## Example
//!
//! ```rust
//! use mapi_auth::{Credentials, ProtocolVersion, ResponseParams};
//!
//! let params = ResponseParams::new(Credentials::new("monetdb", "monetdb"), "demo");
//! let tokens = ["abc", "merovingian", "8", "plain", "LIT", ""];
//!
//! let response = ProtocolVersion::V8.build_response(&params, &tokens).unwrap();
//! assert_eq!(response, "LIT:merovingian:{plain}merovingianabc:sql:demo:");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod credentials;
pub mod error;
pub mod hash;
pub mod version;

pub use credentials::Credentials;
pub use error::AuthError;
pub use hash::HashAlgorithm;
pub use version::{ProtocolVersion, ResponseParams};
