use serde::Serialize;

/// Point-in-time counts for the explain pool, as logged by the advisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub idle: usize,
    /// Connections currently lent out to EXPLAIN calls
    pub active: usize,
    /// Callers blocked in [`super::ConnectionPool::get`]
    pub waiting: usize,
}
