//! # mapi-testing
//!
//! Test infrastructure for MonetDB client development.
//!
//! The centerpiece is a mock MAPI server that speaks the block framing, sends
//! a configurable challenge and greeting, and answers queries from a table of
//! scripted responses. No MonetDB installation is required.
//!
//! ## Mock Server Example
//!
//! ```rust,ignore
//! use mapi_testing::mock_server::{MockColumn, MockMapiServer, MockResponse};
//!
//! #[tokio::test]
//! async fn test_with_mock_server() {
//!     let server = MockMapiServer::builder()
//!         .with_response(
//!             "SELECT id, name FROM users",
//!             MockResponse::rows(
//!                 vec![MockColumn::int("id"), MockColumn::varchar("name")],
//!                 vec![vec![Some("1".into()), Some("'alice'".into())]],
//!             ),
//!         )
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     // Connect your client to server.host() and server.port()
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock_server;

pub use mock_server::{
    DEFAULT_CHALLENGE, MockColumn, MockMapiServer, MockResponse, MockServerBuilder,
    MockServerConfig, MockServerError,
};
