//! The advisor's dedicated connection pool
//!
//! ```ignore
//! use std::time::Duration;
//! use preflight_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 4).with_acquire_timeout(Duration::from_secs(5));
//! let pool = ConnectionPool::new(config, factory)?;
//! let conn = pool.get().await?;
//! // parked again when `conn` drops
//! ```

mod config;
mod pool;
mod stats;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use stats::PoolStats;
