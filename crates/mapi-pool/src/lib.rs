//! # mapi-pool
//!
//! Connection pool for MonetDB keyed by server, user and database.
//!
//! One pool object serves any number of targets. Each `(host, port, user,
//! database)` combination gets its own slot with an idle queue and a bound on
//! the connections checked out at once.
//!
//! ## Features
//!
//! - Bounded checkout with an acquisition timeout
//! - Broken connections are discarded instead of reused
//! - Best-effort pre-creation of `min_connections` per key
//! - Background eviction of idle connections, owned by the pool
//! - Explicit `start` and `shutdown`; shutdown wakes every waiter
//!
//! ## Example
//!
//! ```rust,ignore
//! use mapi_client::Config;
//! use mapi_pool::{Pool, PoolConfig};
//!
//! let config = Config::from_connection_string(
//!     "host=localhost;username=monetdb;password=monetdb;database=demo;poolmaximum=50",
//! )?;
//!
//! let pool = Pool::new(PoolConfig::from_client_config(&config))?;
//! pool.start();
//!
//! let mut conn = pool.get(&config).await?;
//! let rows = conn.query("SELECT 1").await?;
//! drop(conn); // returned to the pool
//!
//! pool.shutdown().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use pool::{Pool, PoolKey, PoolStatus, PooledConnection};
