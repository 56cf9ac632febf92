//! Prepared statements over a shared tokio-postgres client

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use preflight_core::{
    PreflightError, PreparedStatement, QueryResult, Result, StatementResult, Value, WireType,
};
use tokio_postgres::{Client, Statement};

use crate::connection::{query_error, rows_to_result};
use crate::value::{PgValue, as_sql_refs};

type Bindings = BTreeMap<usize, (Value, Option<WireType>)>;

/// A server-side prepared statement with 1-based positional bindings
pub struct PostgresStatement {
    client: Arc<Client>,
    statement: Statement,
    sql: String,
    bindings: Bindings,
    batch: Vec<Bindings>,
}

impl PostgresStatement {
    pub(crate) fn new(client: Arc<Client>, statement: Statement, sql: &str) -> Self {
        Self {
            client,
            statement,
            sql: sql.to_string(),
            bindings: BTreeMap::new(),
            batch: Vec::new(),
        }
    }

    /// Number of placeholders the server reported for this statement
    pub fn param_count(&self) -> usize {
        self.statement.params().len()
    }

    fn encode(&self, bindings: &Bindings) -> Result<Vec<PgValue>> {
        encode_bindings(bindings, self.statement.params())
    }

    async fn run_execute(&self, bindings: &Bindings) -> Result<u64> {
        let values = self.encode(bindings)?;
        self.client
            .execute(&self.statement, &as_sql_refs(&values))
            .await
            .map_err(|e| query_error("Failed to execute statement", &e))
    }
}

/// Encode every placeholder from `bindings`, failing on the first unbound one
fn encode_bindings(bindings: &Bindings, types: &[tokio_postgres::types::Type]) -> Result<Vec<PgValue>> {
    types
        .iter()
        .enumerate()
        .map(|(i, target)| {
            let position = i + 1;
            let (value, wire_type) = bindings.get(&position).ok_or_else(|| {
                PreflightError::Query(format!("No value specified for parameter {}", position))
            })?;
            PgValue::from_binding(value, *wire_type, target)
        })
        .collect()
}

#[async_trait]
impl PreparedStatement for PostgresStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, position: usize, value: Value, wire_type: Option<WireType>) -> Result<()> {
        if position == 0 || position > self.param_count() {
            return Err(PreflightError::Query(format!(
                "parameter position {} out of range (statement has {})",
                position,
                self.param_count()
            )));
        }
        // reject values that cannot be encoded for this parameter up front
        PgValue::from_binding(&value, wire_type, &self.statement.params()[position - 1])?;
        self.bindings.insert(position, (value, wire_type));
        Ok(())
    }

    fn clear_parameters(&mut self) {
        self.bindings.clear();
    }

    async fn execute(&self) -> Result<StatementResult> {
        if self.statement.columns().is_empty() {
            let affected = self.run_execute(&self.bindings).await?;
            tracing::debug!(affected_rows = affected, "prepared statement executed");
            Ok(StatementResult::command(affected))
        } else {
            Ok(StatementResult::rows(self.query().await?))
        }
    }

    async fn query(&self) -> Result<QueryResult> {
        let started = Instant::now();
        let values = self.encode(&self.bindings)?;
        let pg_rows = self
            .client
            .query(&self.statement, &as_sql_refs(&values))
            .await
            .map_err(|e| query_error("Failed to execute query", &e))?;

        rows_to_result(&self.statement, &pg_rows, started)
    }

    fn add_batch(&mut self) -> Result<()> {
        // every placeholder must be bound before an entry is queued
        self.encode(&self.bindings)?;
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        let batch = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(batch.len());
        for bindings in &batch {
            counts.push(self.run_execute(bindings).await?);
        }
        tracing::debug!(entries = counts.len(), "batch executed");
        Ok(counts)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        // dropping the Statement deallocates it on the server
        tracing::trace!("closing prepared statement");
        Ok(())
    }
}

impl std::fmt::Debug for PostgresStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStatement")
            .field("sql", &self.sql)
            .field("bound", &self.bindings.len())
            .field("batched", &self.batch.len())
            .finish()
    }
}
