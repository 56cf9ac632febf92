use crate::context::CaptureContext;
use crate::sink::{QuerySink, deliver_best_effort};
use async_trait::async_trait;
use preflight_core::{
    BoundParam, BoundQuery, PreflightError, PreparedStatement, QueryResult, Result,
    StatementResult, Value, WireType,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A prepared statement that records its bindings and reports executions
///
/// Every call is forwarded to the wrapped statement unchanged. Executions
/// first hand a [`BoundQuery`] to the sink unless the capture context is
/// suppressed.
pub struct CapturingStatement {
    inner: Box<dyn PreparedStatement>,
    sink: Arc<dyn QuerySink>,
    context: CaptureContext,
    data_source_id: Option<String>,
    tags: HashMap<String, String>,
    bound: BTreeMap<usize, BoundParam>,
}

impl CapturingStatement {
    pub fn new(
        inner: Box<dyn PreparedStatement>,
        sink: Arc<dyn QuerySink>,
        context: CaptureContext,
    ) -> Self {
        Self {
            inner,
            sink,
            context,
            data_source_id: None,
            tags: HashMap::new(),
            bound: BTreeMap::new(),
        }
    }

    pub fn with_data_source(mut self, id: Option<String>) -> Self {
        self.data_source_id = id;
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    fn capture(&self) {
        if self.context.is_suppressed() {
            tracing::trace!("capture suppressed");
            return;
        }
        let mut query = BoundQuery::new(self.inner.sql(), self.bound.values().cloned())
            .with_tags(self.tags.clone());
        if let Some(id) = &self.data_source_id {
            query = query.with_data_source(id.clone());
        }
        tracing::debug!(
            params = query.params().len(),
            data_source = ?self.data_source_id,
            "captured statement"
        );
        deliver_best_effort(self.sink.as_ref(), query);
    }
}

impl std::fmt::Debug for CapturingStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturingStatement")
            .field("sql", &self.inner.sql())
            .field("bound", &self.bound.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PreparedStatement for CapturingStatement {
    fn sql(&self) -> &str {
        self.inner.sql()
    }

    fn bind(&mut self, position: usize, value: Value, wire_type: Option<WireType>) -> Result<()> {
        if position == 0 {
            return Err(PreflightError::Query(
                "parameter positions start at 1".to_string(),
            ));
        }
        self.bound.insert(
            position,
            BoundParam::new(position, value.clone()).with_wire_type(wire_type),
        );
        self.inner.bind(position, value, wire_type)
    }

    fn clear_parameters(&mut self) {
        self.bound.clear();
        self.inner.clear_parameters();
    }

    async fn execute(&self) -> Result<StatementResult> {
        self.capture();
        self.inner.execute().await
    }

    async fn query(&self) -> Result<QueryResult> {
        self.capture();
        self.inner.query().await
    }

    async fn execute_update(&self) -> Result<u64> {
        self.capture();
        self.inner.execute_update().await
    }

    fn add_batch(&mut self) -> Result<()> {
        self.inner.add_batch()
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.capture();
        self.inner.execute_batch().await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.inner.close().await
    }
}
