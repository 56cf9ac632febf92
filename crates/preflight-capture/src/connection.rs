use crate::context::CaptureContext;
use crate::sink::QuerySink;
use crate::statement::CapturingStatement;
use async_trait::async_trait;
use preflight_core::{Connection, PreparedStatement, QueryResult, Result, StatementResult, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A connection decorator that captures statements prepared through it
///
/// Only `prepare` is intercepted; the returned statement reports its
/// executions to the sink. Direct `execute` and `query` calls pass through
/// uncaptured.
pub struct InterceptingConnection {
    inner: Arc<dyn Connection>,
    sink: Arc<dyn QuerySink>,
    context: CaptureContext,
    data_source_id: Option<String>,
    tags: HashMap<String, String>,
}

impl InterceptingConnection {
    pub fn new(inner: Arc<dyn Connection>, sink: Arc<dyn QuerySink>) -> Self {
        Self {
            inner,
            sink,
            context: CaptureContext::new(),
            data_source_id: None,
            tags: HashMap::new(),
        }
    }

    /// Shares a capture context, typically the advisor's
    pub fn with_context(mut self, context: CaptureContext) -> Self {
        self.context = context;
        self
    }

    /// Identifies the data source in every captured query
    pub fn with_data_source(mut self, id: impl Into<String>) -> Self {
        self.data_source_id = Some(id.into());
        self
    }

    /// Adds a tag copied into every captured query
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn context(&self) -> &CaptureContext {
        &self.context
    }

    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.inner
    }
}

impl std::fmt::Debug for InterceptingConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptingConnection")
            .field("driver", &self.inner.driver_name())
            .field("data_source_id", &self.data_source_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connection for InterceptingConnection {
    fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.inner.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.inner.query(sql, params).await
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        let inner = self.inner.prepare(sql).await?;
        let statement = CapturingStatement::new(inner, Arc::clone(&self.sink), self.context.clone())
            .with_data_source(self.data_source_id.clone())
            .with_tags(self.tags.clone());
        Ok(Box::new(statement))
    }

    fn dialect_id(&self) -> Option<&'static str> {
        self.inner.dialect_id()
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
