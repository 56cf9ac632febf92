use super::*;
use parking_lot::Mutex;
use preflight_analyzer::{Priority, Recommendation, Rule};
use preflight_capture::{ChannelSink, InterceptingConnection};
use preflight_connection::{ConnectionFactory, PoolConfig};
use preflight_core::{
    BoundParam, Connection, PreflightError, PreparedStatement, QueryResult, Result,
    StatementResult, WireType,
};
use tokio::sync::Notify;

const PLAN_JSON: &str = r#"[{"Plan": {
    "Node Type": "Seq Scan",
    "Relation Name": "users",
    "Filter": "(age = $1)",
    "Plan Rows": 6000000,
    "Plan Width": 8,
    "Total Cost": 125000.5
}}]"#;

#[derive(Debug, Clone, Copy)]
enum Reply {
    Text,
    Json,
    NoRows,
    Number,
    Garbage,
}

#[derive(Debug, Default)]
struct Journal {
    prepared: Vec<String>,
    binds: Vec<(usize, Value, Option<WireType>)>,
    suppressed_during_query: Vec<bool>,
    closed_statements: usize,
}

/// Holds a statement's `query` open until released
#[derive(Debug, Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

struct MockStatement {
    sql: String,
    reply: Reply,
    journal: Arc<Mutex<Journal>>,
    context: CaptureContext,
    gate: Option<Arc<Gate>>,
}

#[async_trait]
impl PreparedStatement for MockStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, position: usize, value: Value, wire_type: Option<WireType>) -> Result<()> {
        self.journal.lock().binds.push((position, value, wire_type));
        Ok(())
    }

    fn clear_parameters(&mut self) {}

    async fn execute(&self) -> Result<StatementResult> {
        Ok(StatementResult::rows(self.query().await?))
    }

    async fn query(&self) -> Result<QueryResult> {
        self.journal
            .lock()
            .suppressed_during_query
            .push(self.context.is_suppressed());
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let column = "QUERY PLAN";
        Ok(match self.reply {
            Reply::Text => QueryResult::single_column(column, vec![Value::String(PLAN_JSON.into())]),
            Reply::Json => QueryResult::single_column(
                column,
                vec![Value::Json(serde_json::from_str(PLAN_JSON).unwrap())],
            ),
            Reply::NoRows => QueryResult::single_column(column, Vec::new()),
            Reply::Number => QueryResult::single_column(column, vec![Value::Int32(1)]),
            Reply::Garbage => {
                QueryResult::single_column(column, vec![Value::String("Seq Scan on users".into())])
            }
        })
    }

    fn add_batch(&mut self) -> Result<()> {
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        Ok(Vec::new())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.journal.lock().closed_statements += 1;
        Ok(())
    }
}

struct MockConnection {
    reply: Reply,
    journal: Arc<Mutex<Journal>>,
    context: CaptureContext,
    gate: Option<Arc<Gate>>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult::command(0))
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        self.journal.lock().prepared.push(sql.to_string());
        Ok(Box::new(MockStatement {
            sql: sql.to_string(),
            reply: self.reply,
            journal: self.journal.clone(),
            context: self.context.clone(),
            gate: self.gate.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

struct MockFactory {
    reply: Reply,
    journal: Arc<Mutex<Journal>>,
    context: CaptureContext,
    gate: Option<Arc<Gate>>,
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(MockConnection {
            reply: self.reply,
            journal: self.journal.clone(),
            context: self.context.clone(),
            gate: self.gate.clone(),
        }))
    }
}

struct FailingFactory;

#[async_trait]
impl ConnectionFactory for FailingFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        Err(PreflightError::Connection("connection refused".into()))
    }
}

#[derive(Debug)]
struct GainRule(f64);

impl Rule for GainRule {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn analyze(&self, _: &BoundQuery, _: &Plan, _: &PlannerSettings) -> Vec<Recommendation> {
        vec![Recommendation::new(Priority::Low, "test", format!("gain {}", self.0), "", self.0)]
    }
}

struct Harness {
    advisor: PlanAdvisor,
    journal: Arc<Mutex<Journal>>,
    context: CaptureContext,
}

fn harness(reply: Reply) -> Harness {
    gated_harness(reply, None)
}

fn gated_harness(reply: Reply, gate: Option<Arc<Gate>>) -> Harness {
    let journal = Arc::new(Mutex::new(Journal::default()));
    let context = CaptureContext::new();
    let factory = MockFactory {
        reply,
        journal: journal.clone(),
        context: context.clone(),
        gate,
    };
    let pool = ConnectionPool::new(PoolConfig::new(0, 2), factory).expect("valid pool config");
    let advisor = PlanAdvisor::builder(Arc::new(pool))
        .context(context.clone())
        .build();
    Harness {
        advisor,
        journal,
        context,
    }
}

fn users_query() -> BoundQuery {
    BoundQuery::new(
        "SELECT * FROM users WHERE age = $1 AND name = $2",
        vec![
            BoundParam::new(2, Value::String("bob".into())),
            BoundParam::typed(1, Value::Int64(42), WireType::Integer),
        ],
    )
}

mod examine_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_examine_text_plan() {
        let h = harness(Reply::Text);
        let result = h.advisor.examine(&users_query()).await.unwrap();

        assert_eq!(result.plan_cost, 125000.5);
        assert_eq!(result.plan.root.relation_name.as_deref(), Some("users"));
        assert_eq!(result.estimates.scanned_bytes, 48_000_000);
        assert_eq!(result.estimates.expected_time_ms, 125000);
        assert!(
            result
                .ddl()
                .any(|ddl| ddl == "CREATE INDEX CONCURRENTLY ON users (age)")
        );
    }

    #[tokio::test]
    async fn test_examine_json_column() {
        let h = harness(Reply::Json);
        let result = h.advisor.examine(&users_query()).await.unwrap();
        assert_eq!(result.plan.root.node_type, "Seq Scan");
    }

    #[tokio::test]
    async fn test_explain_statement_and_binding_order() {
        let h = harness(Reply::Text);
        h.advisor.examine(&users_query()).await.unwrap();

        let journal = h.journal.lock();
        assert_eq!(journal.prepared.len(), 1);
        assert!(journal.prepared[0].starts_with("EXPLAIN (FORMAT JSON, COSTS true, VERBOSE true"));
        assert!(
            journal.prepared[0].ends_with(") SELECT * FROM users WHERE age = $1 AND name = $2")
        );
        assert_eq!(
            journal.binds,
            vec![
                (1, Value::Int64(42), Some(WireType::Integer)),
                (2, Value::String("bob".into()), Some(WireType::Text)),
            ]
        );
        assert_eq!(journal.closed_statements, 1);
    }

    #[tokio::test]
    async fn test_capture_suppressed_only_while_explaining() {
        let h = harness(Reply::Text);
        assert!(!h.context.is_suppressed());

        h.advisor.examine(&users_query()).await.unwrap();

        assert_eq!(h.journal.lock().suppressed_during_query, vec![true]);
        assert!(!h.context.is_suppressed());
    }

    #[tokio::test]
    async fn test_application_task_captures_while_examine_is_in_flight() {
        let gate = Arc::new(Gate::default());
        let h = gated_harness(Reply::Text, Some(gate.clone()));
        let (sink, mut captured) = ChannelSink::bounded(8);
        let application = InterceptingConnection::new(
            Arc::new(MockConnection {
                reply: Reply::Text,
                journal: h.journal.clone(),
                context: h.context.clone(),
                gate: None,
            }),
            Arc::new(sink),
        )
        .with_context(h.context.clone());

        let advisor = Arc::new(h.advisor);
        let examining = {
            let advisor = advisor.clone();
            tokio::spawn(async move { advisor.examine(&users_query()).await })
        };

        gate.entered.notified().await;
        let mut stmt = application
            .prepare("SELECT * FROM users WHERE id = $1")
            .await
            .unwrap();
        stmt.bind(1, Value::Int64(9), None).unwrap();
        stmt.query().await.unwrap();

        let query = captured.try_recv().expect("application query captured");
        assert_eq!(query.sql(), "SELECT * FROM users WHERE id = $1");

        gate.release.notify_one();
        examining.await.unwrap().unwrap();
        assert!(captured.try_recv().is_err());
        assert_eq!(h.journal.lock().suppressed_during_query, vec![true, false]);
    }

    #[tokio::test]
    async fn test_suppression_released_on_error() {
        let h = harness(Reply::NoRows);
        let err = h.advisor.examine(&users_query()).await.unwrap_err();

        assert!(matches!(err, AdvisorError::ExplainExecution(_)));
        assert!(!h.context.is_suppressed());
    }

    #[tokio::test]
    async fn test_unreadable_and_unparsable_plans() {
        let err = harness(Reply::Number)
            .advisor
            .examine(&users_query())
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::UnreadablePlan("int32")));

        let err = harness(Reply::Garbage)
            .advisor
            .examine(&users_query())
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::Parse(_)));
    }

    #[tokio::test]
    async fn test_pool_failure_is_a_database_error() {
        let pool = ConnectionPool::new(PoolConfig::new(0, 1), FailingFactory).unwrap();
        let advisor = PlanAdvisor::builder(Arc::new(pool)).build();

        let err = advisor.examine(&users_query()).await.unwrap_err();
        assert!(matches!(err, AdvisorError::Database(PreflightError::Connection(_))));
        assert!(!advisor.context().is_suppressed());
    }
}

mod analyze_plan_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn advisor_with(engine: RuleEngine, parallel: bool) -> PlanAdvisor {
        let pool = ConnectionPool::new(PoolConfig::new(0, 1), FailingFactory).unwrap();
        PlanAdvisor::builder(Arc::new(pool))
            .engine(engine)
            .parallel_rules(parallel)
            .build()
    }

    #[test]
    fn test_recommendations_ranked_by_gain() {
        let engine = RuleEngine::empty()
            .with_rule(GainRule(10.0))
            .with_rule(GainRule(40.0))
            .with_rule(GainRule(25.0));
        let plan = parse_explain_json(PLAN_JSON).unwrap();
        let query = BoundQuery::new("SELECT 1", Vec::new());

        let sequential = advisor_with(engine, false).analyze_plan(&query, plan.clone());
        let gains: Vec<f64> = sequential
            .recommendations
            .iter()
            .map(|r| r.expected_gain_pct)
            .collect();
        assert_eq!(gains, vec![40.0, 25.0, 10.0]);

        let engine = RuleEngine::empty()
            .with_rule(GainRule(10.0))
            .with_rule(GainRule(40.0))
            .with_rule(GainRule(25.0));
        let parallel = advisor_with(engine, true).analyze_plan(&query, plan);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_from_config() {
        let config = AdvisorConfig::from_toml_str(
            r#"
explain_preset = "ci"
[planner]
work_mem_mb = 16
"#,
        )
        .unwrap();
        let pool = ConnectionPool::new(PoolConfig::new(0, 1), FailingFactory).unwrap();
        let advisor = PlanAdvisor::from_config(&config, Arc::new(pool));

        assert_eq!(*advisor.options(), ExplainOptions::ci());
        assert_eq!(advisor.planner().work_mem_mb, 16);
        assert_eq!(advisor.engine().len(), 18);
    }

    #[tokio::test]
    async fn test_connect_requires_database_section() {
        let err = PlanAdvisor::connect(&AdvisorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::Database(PreflightError::Configuration(_))
        ));
    }
}
