//! Connection pool implementation.

use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use mapi_client::{Client, Config, Ready};
use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::error::PoolError;

/// Identity of a pool slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// User name.
    pub username: String,
    /// Database name.
    pub database: String,
}

impl PoolKey {
    /// The key a client configuration connects under.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.credentials.username().to_string(),
            database: config.database.clone(),
        }
    }
}

/// A connection waiting in the idle queue.
struct IdleConnection {
    client: Client<Ready>,
    since: Instant,
}

#[derive(Default)]
struct SlotState {
    /// Oldest at the front.
    idle: VecDeque<IdleConnection>,
    busy: usize,
}

/// Connections for one key.
struct Slot {
    key: PoolKey,
    state: Mutex<SlotState>,
    /// One permit per connection that may be checked out.
    semaphore: Arc<Semaphore>,
}

impl Slot {
    fn new(key: PoolKey, max_connections: usize) -> Self {
        Self {
            key,
            state: Mutex::new(SlotState::default()),
            semaphore: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Take the most recently returned healthy connection.
    fn pop_idle(&self) -> Option<Client<Ready>> {
        let mut state = self.state.lock();
        while let Some(idle) = state.idle.pop_back() {
            if idle.client.is_broken() {
                tracing::debug!(key = ?self.key, "discarding broken idle connection");
                continue;
            }
            return Some(idle.client);
        }
        None
    }

    fn push_idle(&self, client: Client<Ready>) {
        self.state.lock().idle.push_back(IdleConnection {
            client,
            since: Instant::now(),
        });
    }

    /// Drop idle connections older than `idle_timeout`, keeping at least
    /// `min_connections` busy and idle together.
    fn evict(&self, idle_timeout: Duration, min_connections: usize) -> usize {
        let mut state = self.state.lock();
        let before = state.idle.len();
        state.idle.retain(|idle| !idle.client.is_broken());

        let now = Instant::now();
        while state.idle.len() + state.busy > min_connections {
            match state.idle.front() {
                Some(idle) if now.duration_since(idle.since) >= idle_timeout => {
                    state.idle.pop_front();
                }
                _ => break,
            }
        }

        before - state.idle.len()
    }

    fn status(&self, max: usize) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            busy: state.busy,
            total: state.idle.len() + state.busy,
            max,
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    slots: Mutex<HashMap<PoolKey, Arc<Slot>>>,
    closed: Mutex<bool>,
    shutdown: Arc<Notify>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl PoolInner {
    fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// The slot for `key`, and whether it was just created.
    fn slot(&self, key: &PoolKey) -> (Arc<Slot>, bool) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return (Arc::clone(slot), false);
        }

        let slot = Arc::new(Slot::new(key.clone(), self.config.max_connections));
        slots.insert(key.clone(), Arc::clone(&slot));
        (slot, true)
    }

    /// Open `min_connections` idle connections. Failures are only logged.
    async fn warm_up(&self, slot: &Slot, config: &Config) {
        for _ in 0..self.config.min_connections {
            match Client::connect(config.clone()).await {
                Ok(client) => slot.push_idle(client),
                Err(e) => {
                    tracing::warn!(key = ?slot.key, error = %e, "failed to pre-create connection");
                    break;
                }
            }
        }
    }

    fn evict_idle(&self) {
        let slots: Vec<Arc<Slot>> = self.slots.lock().values().cloned().collect();
        for slot in slots {
            let evicted = slot.evict(self.config.idle_timeout, self.config.min_connections);
            if evicted > 0 {
                tracing::debug!(key = ?slot.key, evicted = evicted, "evicted idle connections");
            }
        }
    }
}

/// A connection pool for MonetDB.
///
/// Cloning the pool is cheap; clones share the same connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool. Nothing is connected until the first [`get`](Self::get).
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                slots: Mutex::new(HashMap::new()),
                closed: Mutex::new(false),
                shutdown: Arc::new(Notify::new()),
                maintenance: Mutex::new(None),
            }),
        })
    }

    /// Start the eviction task. Calling this again has no effect.
    pub fn start(&self) {
        if self.is_closed() {
            return;
        }

        let mut maintenance = self.inner.maintenance.lock();
        if maintenance.is_some() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let shutdown = Arc::clone(&self.inner.shutdown);
        let interval = self.inner.config.maintenance_interval;
        *maintenance = Some(tokio::spawn(run_maintenance(weak, shutdown, interval)));

        tracing::info!(interval = ?interval, "connection pool started");
    }

    /// Get a connection for `config` from the pool.
    ///
    /// An idle connection is reused when one is available, otherwise a new
    /// one is opened. When `max_connections` are already checked out for
    /// this key, this waits until one is returned or the timeout is reached.
    pub async fn get(&self, config: &Config) -> Result<PooledConnection, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let key = PoolKey::from_config(config);
        let (slot, created) = self.inner.slot(&key);
        if created {
            self.inner.warm_up(&slot, config).await;
        }

        tracing::trace!(key = ?key, "acquiring connection from pool");

        let timeout = self.inner.config.connection_timeout;
        let acquire = Arc::clone(&slot.semaphore).acquire_owned();
        let permit = match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::PoolClosed),
            Err(_) => return Err(PoolError::AcquisitionTimeout(timeout)),
        };

        let client = match slot.pop_idle() {
            Some(client) => client,
            None => Client::connect(config.clone()).await?,
        };
        slot.state.lock().busy += 1;

        Ok(PooledConnection {
            client: Some(client),
            slot,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Status of the slot `config` connects under, if it has been used.
    #[must_use]
    pub fn status(&self, config: &Config) -> Option<PoolStatus> {
        let key = PoolKey::from_config(config);
        let slot = self.inner.slots.lock().get(&key).cloned()?;
        Some(slot.status(self.inner.config.max_connections))
    }

    /// Close the pool.
    ///
    /// The eviction task is stopped, every waiter in [`get`](Self::get)
    /// fails with [`PoolError::PoolClosed`] and idle connections are closed.
    /// Checked-out connections are dropped when they are returned.
    pub async fn shutdown(&self) {
        {
            let mut closed = self.inner.closed.lock();
            if *closed {
                return;
            }
            *closed = true;
        }

        self.inner.shutdown.notify_one();
        let task = self.inner.maintenance.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "eviction task ended abnormally");
            }
        }

        let slots: Vec<Arc<Slot>> = self.inner.slots.lock().drain().map(|(_, s)| s).collect();
        for slot in slots {
            slot.semaphore.close();
            let idle = std::mem::take(&mut slot.state.lock().idle);
            for connection in idle {
                if let Err(e) = connection.client.close().await {
                    tracing::debug!(error = %e, "error closing idle connection");
                }
            }
        }

        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("slots", &self.inner.slots.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_maintenance(pool: Weak<PoolInner>, shutdown: Arc<Notify>, interval: Duration) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                inner.evict_idle();
            }
            _ = shutdown.notified() => break,
        }
    }
    tracing::debug!("eviction task stopped");
}

/// Status information about one pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub idle: usize,
    /// Number of connections currently in use.
    pub busy: usize,
    /// Total number of connections.
    pub total: usize,
    /// Maximum connections checked out at once.
    pub max: usize,
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is automatically returned to the pool.
pub struct PooledConnection {
    client: Option<Client<Ready>>,
    slot: Arc<Slot>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Detach the connection from the pool.
    ///
    /// The client is no longer counted as busy and is not returned when
    /// dropped.
    pub fn detach(mut self) -> Option<Client<Ready>> {
        let client = self.client.take();
        self.release_busy();
        client
    }

    fn release_busy(&self) {
        let mut state = self.slot.state.lock();
        state.busy = state.busy.saturating_sub(1);
    }
}

impl Deref for PooledConnection {
    type Target = Client<Ready>;

    fn deref(&self) -> &Self::Target {
        match &self.client {
            Some(client) => client,
            None => unreachable!("client is only taken when the connection is consumed"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.client {
            Some(client) => client,
            None => unreachable!("client is only taken when the connection is consumed"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        self.release_busy();

        if client.is_broken() || self.pool.is_closed() {
            tracing::trace!(key = ?self.slot.key, "discarding connection");
            return;
        }

        tracing::trace!(key = ?self.slot.key, "returning connection to pool");
        self.slot.push_idle(client);
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("key", &self.slot.key)
            .field("client", &self.client)
            .finish()
    }
}
