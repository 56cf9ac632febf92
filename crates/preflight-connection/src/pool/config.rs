//! Sizing and timeouts for the explain pool

use std::time::Duration;

use preflight_core::{PreflightError, Result};
use serde::{Deserialize, Serialize};

/// How many EXPLAIN connections to keep and how long to wait for one
///
/// Deserializes from the `[pool]` table of the advisor config; any key may
/// be left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Opened eagerly by [`super::ConnectionPool::warm_up`]
    pub min_size: usize,
    pub max_size: usize,
    pub acquire_timeout_ms: u64,
    /// Idle connections unused for longer are closed on the next acquire
    pub idle_timeout_ms: u64,
}

impl PoolConfig {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            ..Self::default()
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(PreflightError::Configuration(
                "explain pool needs max_size of at least 1".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(PreflightError::Configuration(format!(
                "explain pool min_size {} is above max_size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// One warm connection, up to four, 30s to acquire, 10min idle
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 4,
            acquire_timeout_ms: 30_000,
            idle_timeout_ms: 600_000,
        }
    }
}
