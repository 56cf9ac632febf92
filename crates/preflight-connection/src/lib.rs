//! Preflight Connection - pooled connections for internal traffic
//!
//! The advisor runs its `EXPLAIN` statements on a pool of its own so that
//! analysis never competes with the application for connections.

pub mod pool;

pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PooledConnection};
