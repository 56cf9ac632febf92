//! The plan advisor

use std::sync::Arc;

use async_trait::async_trait;
use preflight_analyzer::{
    Plan, PlannerSettings, PreflightEstimator, RuleEngine, parse_explain_json,
    parse_explain_value,
};
use preflight_capture::CaptureContext;
use preflight_connection::ConnectionPool;
use preflight_core::{BoundQuery, Value};
use preflight_driver_postgres::PostgresConnectionFactory;

use crate::binding::bind_param;
use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, AdvisorResult};
use crate::options::ExplainOptions;
use crate::result::AnalysisResult;

/// Something that can examine a captured query
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn examine(&self, query: &BoundQuery) -> AdvisorResult<AnalysisResult>;
}

/// Plans captured queries with `EXPLAIN` and runs the rule engine over them
///
/// EXPLAIN traffic goes through `explain_pool` only and runs inside
/// [`CaptureContext::suppressed`]. Share that context with the intercepting
/// connections so the advisor's own statements are never captured, while
/// application tasks on the same context keep capturing.
#[derive(Debug)]
pub struct PlanAdvisor {
    explain_pool: Arc<ConnectionPool>,
    engine: RuleEngine,
    planner: PlannerSettings,
    options: ExplainOptions,
    estimator: PreflightEstimator,
    context: CaptureContext,
    parallel_rules: bool,
}

impl PlanAdvisor {
    pub fn builder(explain_pool: Arc<ConnectionPool>) -> PlanAdvisorBuilder {
        PlanAdvisorBuilder::new(explain_pool)
    }

    /// Build an advisor over an existing pool from configuration
    pub fn from_config(config: &AdvisorConfig, explain_pool: Arc<ConnectionPool>) -> Self {
        PlanAdvisorBuilder::new(explain_pool)
            .engine(config.rule_engine())
            .planner(config.planner)
            .options(config.explain_options())
            .estimator(config.estimator())
            .parallel_rules(config.parallel_rules)
            .build()
    }

    /// Open the dedicated PostgreSQL pool described by `config.database`
    ///
    /// The pool is warmed up to its minimum size so connection problems
    /// surface here rather than on the first examined query.
    pub async fn connect(config: &AdvisorConfig) -> AdvisorResult<Self> {
        let database = config.database.clone().ok_or_else(|| {
            preflight_core::PreflightError::Configuration(
                "advisor config has no [database] section".into(),
            )
        })?;

        let pool = ConnectionPool::new(
            config.pool.clone(),
            PostgresConnectionFactory::new(database),
        )?;
        let opened = pool.warm_up().await?;
        tracing::info!(opened, max_size = config.pool.max_size(), "explain pool ready");

        Ok(Self::from_config(config, Arc::new(pool)))
    }

    pub fn context(&self) -> &CaptureContext {
        &self.context
    }

    pub fn options(&self) -> &ExplainOptions {
        &self.options
    }

    pub fn planner(&self) -> &PlannerSettings {
        &self.planner
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn explain_pool(&self) -> &Arc<ConnectionPool> {
        &self.explain_pool
    }

    /// Estimate and evaluate rules for a plan obtained elsewhere
    pub fn analyze_plan(&self, query: &BoundQuery, plan: Plan) -> AnalysisResult {
        let estimates = self.estimator.estimate(&plan, &self.planner, query.sql());
        let recommendations = if self.parallel_rules {
            self.engine.evaluate_parallel(query, &plan, &self.planner)
        } else {
            self.engine.evaluate(query, &plan, &self.planner)
        };

        AnalysisResult {
            plan_cost: plan.total_cost,
            plan,
            estimates,
            recommendations,
        }
    }

    async fn explain(&self, query: &BoundQuery) -> AdvisorResult<Plan> {
        self.context.suppressed(self.run_explain(query)).await
    }

    async fn run_explain(&self, query: &BoundQuery) -> AdvisorResult<Plan> {
        let sql = self.options.wrap(query.sql());
        let connection = self.explain_pool.get().await?;
        let mut statement = connection.prepare(&sql).await?;
        for param in query.params() {
            let binder = bind_param(statement.as_mut(), param)?;
            tracing::trace!(position = param.position, ?binder, "parameter bound");
        }

        let result = statement.query().await;
        if let Err(e) = statement.close().await {
            tracing::debug!(error = %e, "failed to close EXPLAIN statement");
        }
        let result = result?;

        let row = result
            .rows
            .first()
            .ok_or_else(|| AdvisorError::ExplainExecution("EXPLAIN returned no rows".into()))?;

        let plan = match row.get(0) {
            Some(Value::String(text)) => parse_explain_json(text)?,
            Some(Value::Json(json)) => parse_explain_value(json)?,
            Some(other) => return Err(AdvisorError::UnreadablePlan(other.kind())),
            None => {
                return Err(AdvisorError::ExplainExecution(
                    "EXPLAIN returned an empty row".into(),
                ));
            }
        };
        Ok(plan)
    }
}

#[async_trait]
impl Advisor for PlanAdvisor {
    /// EXPLAIN `query` once on the dedicated pool and analyze the plan
    #[tracing::instrument(skip(self, query), fields(params = query.params().len()))]
    async fn examine(&self, query: &BoundQuery) -> AdvisorResult<AnalysisResult> {
        let plan = self.explain(query).await?;
        let result = self.analyze_plan(query, plan);
        tracing::debug!(
            plan_cost = result.plan_cost,
            recommendations = result.recommendations.len(),
            pool = ?self.explain_pool.stats(),
            "query examined"
        );
        Ok(result)
    }
}

/// Builder for [`PlanAdvisor`]
///
/// Defaults: the standard rule set, default planner settings, the advisor
/// EXPLAIN preset, the default estimator and a fresh capture context.
pub struct PlanAdvisorBuilder {
    explain_pool: Arc<ConnectionPool>,
    engine: Option<RuleEngine>,
    planner: PlannerSettings,
    options: ExplainOptions,
    estimator: PreflightEstimator,
    context: CaptureContext,
    parallel_rules: bool,
}

impl PlanAdvisorBuilder {
    pub fn new(explain_pool: Arc<ConnectionPool>) -> Self {
        Self {
            explain_pool,
            engine: None,
            planner: PlannerSettings::default(),
            options: ExplainOptions::advisor(),
            estimator: PreflightEstimator::default(),
            context: CaptureContext::new(),
            parallel_rules: false,
        }
    }

    pub fn engine(mut self, engine: RuleEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn planner(mut self, planner: PlannerSettings) -> Self {
        self.planner = planner;
        self
    }

    pub fn options(mut self, options: ExplainOptions) -> Self {
        self.options = options;
        self
    }

    pub fn estimator(mut self, estimator: PreflightEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Share a capture context with the intercepting connections
    pub fn context(mut self, context: CaptureContext) -> Self {
        self.context = context;
        self
    }

    pub fn parallel_rules(mut self, enabled: bool) -> Self {
        self.parallel_rules = enabled;
        self
    }

    pub fn build(self) -> PlanAdvisor {
        PlanAdvisor {
            explain_pool: self.explain_pool,
            engine: self.engine.unwrap_or_default(),
            planner: self.planner,
            options: self.options,
            estimator: self.estimator,
            context: self.context,
            parallel_rules: self.parallel_rules,
        }
    }
}

#[cfg(test)]
mod tests;
