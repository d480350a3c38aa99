//! Pool configuration.

use std::time::Duration;

use mapi_client::config::{DEFAULT_POOL_MAXIMUM, DEFAULT_POOL_MINIMUM};

use crate::error::PoolError;

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Connections kept per key, busy and idle together.
    pub min_connections: usize,

    /// Connections checked out at once per key.
    pub max_connections: usize,

    /// Time to wait for a connection before timing out.
    pub connection_timeout: Duration,

    /// Time a connection can be idle before being closed.
    pub idle_timeout: Duration,

    /// Interval between eviction sweeps.
    pub maintenance_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_POOL_MINIMUM,
            max_connections: DEFAULT_POOL_MAXIMUM,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            maintenance_interval: Duration::from_secs(1),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the pool bounds from a client configuration.
    ///
    /// These come from the `poolminimum` and `poolmaximum` connection
    /// string keys.
    #[must_use]
    pub fn from_client_config(config: &mapi_client::Config) -> Self {
        Self::default()
            .min_connections(config.pool_minimum)
            .max_connections(config.pool_maximum)
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: usize) -> Self {
        self.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: usize) -> Self {
        self.max_connections = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the interval between eviction sweeps.
    #[must_use]
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.min_connections == 0 {
            return Err(PoolError::Configuration(
                "min_connections must be greater than 0".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(PoolError::Configuration(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(PoolError::Configuration(
                "min_connections cannot be greater than max_connections".into(),
            ));
        }
        if self.maintenance_interval.is_zero() {
            return Err(PoolError::Configuration(
                "maintenance_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
