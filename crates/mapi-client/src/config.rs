//! Client configuration.

use std::time::Duration;

use mapi_auth::Credentials;

use crate::error::Error;

/// Default MAPI port.
pub const DEFAULT_PORT: u16 = 50000;

/// Default lower bound of a connection pool.
pub const DEFAULT_POOL_MINIMUM: usize = 3;

/// Default upper bound of a connection pool.
pub const DEFAULT_POOL_MAXIMUM: usize = 20;

/// Configuration for server redirect handling.
///
/// A MonetDB monitor may answer the handshake with `^mapi:monetdb://...`
/// lines pointing at the server that actually hosts the database.
#[derive(Debug, Clone)]
pub struct RedirectConfig {
    /// Maximum number of redirect attempts (default: 10).
    pub max_redirects: u8,
    /// Whether to follow redirects automatically (default: true).
    pub follow_redirects: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            follow_redirects: true,
        }
    }
}

impl RedirectConfig {
    /// Create a new redirect configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of redirect attempts.
    #[must_use]
    pub fn max_redirects(mut self, max: u8) -> Self {
        self.max_redirects = max;
        self
    }

    /// Enable or disable automatic redirect following.
    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Disable automatic redirect following.
    ///
    /// The handshake then completes on the first server and the redirect
    /// lines are ignored.
    #[must_use]
    pub fn no_follow() -> Self {
        Self {
            max_redirects: 0,
            follow_redirects: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Time to establish the TCP connection (default: 15s).
    pub connect_timeout: Duration,
    /// Time allowed for each block read (default: 120s).
    pub read_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(120),
        }
    }
}

impl TimeoutConfig {
    /// Create a new timeout configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TCP connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-block read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Configuration for connecting to MonetDB.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future releases without breaking semver. Use [`Config::default()`]
/// or [`Config::from_connection_string()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 50000).
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Authentication credentials.
    pub credentials: Credentials,

    /// Query language (default: `sql`).
    pub language: String,

    /// Comma separated hash algorithms that replace the server's list.
    pub hash: Option<String>,

    /// Lower bound for a pool built from this configuration.
    pub pool_minimum: usize,

    /// Upper bound for a pool built from this configuration.
    pub pool_maximum: usize,

    /// Redirect handling configuration.
    pub redirect: RedirectConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: String::new(),
            credentials: Credentials::new("", ""),
            language: "sql".to_string(),
            hash: None,
            pool_minimum: DEFAULT_POOL_MINIMUM,
            pool_maximum: DEFAULT_POOL_MAXIMUM,
            redirect: RedirectConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into configuration.
    ///
    /// ```text
    /// host=localhost;port=50000;username=monetdb;password=monetdb;database=demo
    /// ```
    ///
    /// `poolminimum` and `poolmaximum` only ever raise the pool defaults.
    pub fn from_connection_string(conn_str: &str) -> Result<Self, Error> {
        let mut config = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::Config(format!("ConnectionString is not well-formed: {part}"))
            })?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "host" => {
                    config.host = value.to_string();
                }
                "port" => {
                    config.port = value.parse().map_err(|_| {
                        Error::Config(format!("Port is not a valid integer: {value}"))
                    })?;
                }
                "username" => {
                    let password = config.credentials.password().to_string();
                    config.credentials = Credentials::new(value.to_string(), password);
                }
                "password" => {
                    let username = config.credentials.username().to_string();
                    config.credentials = Credentials::new(username, value.to_string());
                }
                "database" => {
                    config.database = value.to_string();
                }
                "poolminimum" => {
                    let minimum: usize = value.parse().map_err(|_| {
                        Error::Config(format!("poolminimum is not a valid integer: {value}"))
                    })?;
                    config.pool_minimum = config.pool_minimum.max(minimum);
                }
                "poolmaximum" => {
                    let maximum: usize = value.parse().map_err(|_| {
                        Error::Config(format!("poolmaximum is not a valid integer: {value}"))
                    })?;
                    config.pool_maximum = config.pool_maximum.max(maximum);
                }
                _ => {
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        if config.database.is_empty() {
            return Err(Error::Config(
                "Database name not specified. Please specify database.".into(),
            ));
        }

        Ok(config)
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the username, keeping the password.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.credentials =
            Credentials::new(username.into(), self.credentials.password().to_string());
        self
    }

    /// Set the password, keeping the username.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.credentials =
            Credentials::new(self.credentials.username().to_string(), password.into());
        self
    }

    /// Set the query language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Restrict hash negotiation to the given comma separated algorithms.
    #[must_use]
    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Set the redirect handling configuration.
    #[must_use]
    pub fn redirect(mut self, redirect: RedirectConfig) -> Self {
        self.redirect = redirect;
        self
    }

    /// Set the maximum number of redirect attempts.
    #[must_use]
    pub fn max_redirects(mut self, max: u8) -> Self {
        self.redirect.max_redirects = max;
        self
    }

    /// Set the timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// A copy of this configuration pointing at a redirect target.
    #[must_use]
    pub(crate) fn redirected(&self, host: String, port: u16, database: String) -> Self {
        Self {
            host,
            port,
            database,
            ..self.clone()
        }
    }
}
