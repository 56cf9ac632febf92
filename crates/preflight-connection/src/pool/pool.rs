//! The explain connection pool

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use preflight_core::{Connection, PreflightError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Opens connections for a [`ConnectionPool`]
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Checked before an idle connection is lent out again
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}

struct Parked {
    connection: Arc<dyn Connection>,
    parked_at: Instant,
}

/// Bounded pool of connections reserved for EXPLAIN traffic
///
/// A semaphore caps lent-out connections at `max_size`; callers beyond that
/// wait up to the acquire timeout. Returned connections are parked and
/// reused first-in first-out.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    parked: Mutex<VecDeque<Parked>>,
    permits: Arc<Semaphore>,
    active: AtomicUsize,
    waiting: AtomicUsize,
}

impl ConnectionPool {
    /// Validates `config`; no connection is opened until [`Self::warm_up`]
    /// or the first [`Self::get`]
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_size)),
            config,
            factory: Arc::new(factory),
            parked: Mutex::new(VecDeque::new()),
            active: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        })
    }

    /// Opens connections until `min_size` are parked, returning how many
    /// were opened
    pub async fn warm_up(&self) -> Result<usize> {
        let missing = self.config.min_size.saturating_sub(self.parked.lock().len());
        for _ in 0..missing {
            let connection = self.factory.create().await?;
            self.park(connection);
        }
        if missing > 0 {
            tracing::debug!(opened = missing, "explain pool warmed up");
        }
        Ok(missing)
    }

    /// Lends out a connection, reusing a parked one when it is still valid
    ///
    /// Fails with [`PreflightError::Timeout`] when no slot frees up within
    /// the acquire timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        let timeout = self.config.acquire_timeout();
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let acquired = tokio::time::timeout(timeout, async {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| PreflightError::Connection("explain pool is shut".into()))?;
            let connection = match self.unpark().await {
                Some(connection) => connection,
                None => {
                    tracing::trace!("opening explain connection");
                    self.factory.create().await?
                }
            };
            Ok::<_, PreflightError>(PooledConnection {
                connection: Some(connection),
                pool: self,
                _permit: permit,
            })
        })
        .await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        match acquired {
            Ok(Ok(conn)) => {
                self.active.fetch_add(1, Ordering::SeqCst);
                Ok(conn)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not open explain connection");
                Err(e)
            }
            Err(_) => Err(PreflightError::Timeout(format!(
                "no explain connection free within {timeout:?}"
            ))),
        }
    }

    /// Pops parked connections, closing stale or invalid ones, until a usable
    /// one turns up
    async fn unpark(&self) -> Option<Arc<dyn Connection>> {
        loop {
            let Parked {
                connection,
                parked_at,
            } = self.parked.lock().pop_front()?;

            let stale = parked_at.elapsed() > self.config.idle_timeout();
            if stale || !self.factory.validate(&*connection).await {
                tracing::trace!(stale, "dropping parked explain connection");
                let _ = connection.close().await;
                continue;
            }
            return Some(connection);
        }
    }

    fn park(&self, connection: Arc<dyn Connection>) {
        self.parked.lock().push_back(Parked {
            connection,
            parked_at: Instant::now(),
        });
    }

    fn give_back(&self, connection: Arc<dyn Connection>) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if !connection.is_closed() {
            self.park(connection);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.parked.lock().len(),
            active: self.active.load(Ordering::SeqCst),
            waiting: self.waiting.load(Ordering::SeqCst),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Closes every parked connection; lent-out ones are unaffected
    pub async fn close_idle(&self) {
        let parked: Vec<_> = self.parked.lock().drain(..).collect();
        let closed = parked.len();
        for entry in parked {
            if let Err(e) = entry.connection.close().await {
                tracing::debug!(error = %e, "error closing parked explain connection");
            }
        }
        tracing::debug!(closed, "closed parked explain connections");
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A lent-out connection; dropping it parks the connection again
pub struct PooledConnection<'a> {
    connection: Option<Arc<dyn Connection>>,
    pool: &'a ConnectionPool,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection taken").as_ref()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.give_back(connection);
        }
    }
}
