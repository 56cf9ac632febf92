//! PostgreSQL connection implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use preflight_core::{
    ColumnMeta, Connection, PreflightError, PreparedStatement, QueryResult, Result, Row,
    StatementResult, Value,
};
use tokio_postgres::{Client, NoTls, Row as PgRow, Statement};

use crate::config::PostgresConfig;
use crate::statement::PostgresStatement;
use crate::tls::build_tls_connector;
use crate::value::{as_sql_refs, encode_params, postgres_to_value};

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail()
        && !detail.trim().is_empty()
    {
        message.push_str(&format!(" (detail: {})", detail));
    }

    if let Some(hint) = db_error.hint()
        && !hint.trim().is_empty()
    {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match code.code() {
        "42601" => format!("syntax error: {}", message),
        "42P01" => format!("undefined table: {}", message),
        "42703" => format!("undefined column: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        _ => format!("{} (code: {})", message, code.code()),
    }
}

pub(crate) fn query_error(context: &str, error: &tokio_postgres::Error) -> PreflightError {
    PreflightError::Query(format!("{}: {}", context, format_postgres_error(error)))
}

/// Collect the rows of an executed statement into a [`QueryResult`]
///
/// Column metadata comes from the statement so empty results keep their
/// columns.
pub(crate) fn rows_to_result(
    statement: &Statement,
    pg_rows: &[PgRow],
    started: Instant,
) -> Result<QueryResult> {
    let columns: Vec<ColumnMeta> = statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.type_().name().to_string(),
            ordinal,
        })
        .collect();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::with_capacity(pg_rows.len());
    for pg_row in pg_rows {
        let values = (0..columns.len())
            .map(|idx| postgres_to_value(pg_row, idx))
            .collect::<Result<Vec<Value>>>()?;
        rows.push(Row::new(column_names.clone(), values));
    }

    Ok(QueryResult {
        columns,
        rows,
        execution_time_ms: started.elapsed().as_millis() as u64,
        ..QueryResult::empty()
    })
}

/// PostgreSQL connection wrapper
///
/// tokio-postgres pipelines requests on one client, so statements prepared
/// from this connection share its client.
pub struct PostgresConnection {
    client: Arc<Client>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    ///
    /// The connection task is spawned on the current tokio runtime.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            ssl_mode = %config.ssl_mode,
            "connecting to PostgreSQL database"
        );

        let pg_config = config.to_pg_config();

        let client = if config.ssl_mode.uses_tls() {
            let tls = build_tls_connector(config)
                .map_err(|e| PreflightError::Connection(e.to_string()))?;
            let (client, connection) = pg_config.connect(tls).await.map_err(|e| {
                PreflightError::Connection(format!(
                    "Failed to connect to PostgreSQL: {}",
                    format_postgres_error(&e)
                ))
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        } else {
            let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
                PreflightError::Connection(format!(
                    "Failed to connect to PostgreSQL: {}",
                    format_postgres_error(&e)
                ))
            })?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            client
        };

        tracing::info!(
            host = %config.host,
            database = %config.database,
            "PostgreSQL connection established"
        );
        Ok(Self {
            client: Arc::new(client),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PreflightError::Connection("connection is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("postgresql")
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;

        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| query_error("Failed to prepare statement", &e))?;

        let pg_params = encode_params(params, statement.params())?;
        let rows_affected = self
            .client
            .execute(&statement, &as_sql_refs(&pg_params))
            .await
            .map_err(|e| query_error("Failed to execute statement", &e))?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(StatementResult::command(rows_affected))
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let started = Instant::now();

        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| query_error("Failed to prepare query", &e))?;

        let pg_params = encode_params(params, statement.params())?;
        let pg_rows = self
            .client
            .query(&statement, &as_sql_refs(&pg_params))
            .await
            .map_err(|e| query_error("Failed to execute query", &e))?;

        let result = rows_to_result(&statement, &pg_rows, started)?;
        tracing::debug!(
            row_count = result.row_count(),
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        self.ensure_open()?;

        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| query_error("Failed to prepare statement", &e))?;

        tracing::debug!(params = statement.params().len(), "statement prepared");
        Ok(Box::new(PostgresStatement::new(
            Arc::clone(&self.client),
            statement,
            sql,
        )))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_closed()
    }
}
