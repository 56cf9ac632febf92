//! Connection and prepared statement traits

use crate::{QueryResult, Result, StatementResult, Value, WireType};
use async_trait::async_trait;

/// A database connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Prepare a statement whose parameters are bound one at a time
    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>>;

    /// Get the dialect identifier for this connection (e.g., "postgresql")
    ///
    /// Returns None if the dialect is unknown.
    fn dialect_id(&self) -> Option<&'static str> {
        None
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A prepared statement with positional parameter binding
///
/// Positions are 1-based. Binding the same position twice replaces the
/// earlier value. Bound values persist across executions until
/// `clear_parameters` is called.
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// The SQL text this statement was prepared from
    fn sql(&self) -> &str;

    /// Bind `value` at `position`, optionally with an explicit wire type
    fn bind(&mut self, position: usize, value: Value, wire_type: Option<WireType>) -> Result<()>;

    /// Remove all bound parameters
    fn clear_parameters(&mut self);

    /// Execute with the currently bound parameters
    async fn execute(&self) -> Result<StatementResult>;

    /// Run as a query with the currently bound parameters
    async fn query(&self) -> Result<QueryResult>;

    /// Execute as a command and return the number of affected rows
    async fn execute_update(&self) -> Result<u64> {
        Ok(self.execute().await?.affected_rows)
    }

    /// Snapshot the current bindings into the pending batch
    fn add_batch(&mut self) -> Result<()>;

    /// Execute every pending batch entry, returning affected rows per entry
    async fn execute_batch(&mut self) -> Result<Vec<u64>>;

    /// Close/deallocate the prepared statement
    async fn close(self: Box<Self>) -> Result<()>;
}
