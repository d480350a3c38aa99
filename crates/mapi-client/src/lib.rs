//! # mapi-client
//!
//! High-level async MonetDB client with type-state connection management.
//!
//! This is the primary public API surface of the workspace. It drives the
//! MAPI handshake, sends commands and walks their responses with a
//! forward-only cursor.
//!
//! ## Features
//!
//! - **Type-state pattern**: Compile-time enforcement of connection states
//! - **Async/await**: Built on Tokio for efficient async I/O
//! - **Streaming results**: Rows are decoded one line at a time
//! - **Redirects**: Monitor redirects are followed transparently
//! - **Transactions**: `START TRANSACTION`, `COMMIT` and `ROLLBACK`
//!
//! ## Type-State Connection Management
//!
//! ```text
//! Disconnected -> Ready (via connect())
//! Ready -> InTransaction (via begin_transaction())
//! InTransaction -> Ready (via commit() or rollback())
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use mapi_client::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_connection_string(
//!         "host=localhost;port=50000;username=monetdb;password=monetdb;database=demo",
//!     )?;
//!
//!     let mut client = Client::connect(config).await?;
//!
//!     for row in client.query("SELECT name FROM sys.tables").await? {
//!         println!("table: {}", row.get(0).unwrap_or("NULL"));
//!     }
//!
//!     let mut tx = client.begin_transaction().await?;
//!     tx.execute_non_query("INSERT INTO t VALUES (1)").await?;
//!     let client = tx.commit().await?;
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod config;
mod connection;
pub mod error;
pub mod row;
pub mod state;
pub mod stream;
pub mod transaction;

// Re-export commonly used types
pub use catalog::{Catalog, ColumnDetail, FunctionKind, SchemaInfo, TableInfo};
pub use client::Client;
pub use config::{Config, RedirectConfig, TimeoutConfig};
pub use error::{Error, Result};
pub use mapi_auth::Credentials;
pub use mapi_protocol::{ColumnType, QueryKind, ResultHeader};
pub use row::{Column, Row};
pub use state::{ConnectionState, Disconnected, InTransaction, Ready};
pub use stream::{ResultSet, ResultStream};
pub use transaction::IsolationLevel;
