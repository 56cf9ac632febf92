//! Advisory rules
//!
//! Each [`Rule`] inspects a captured statement and its plan and emits zero or
//! more [`Recommendation`]s. The [`RuleEngine`] runs a rule set and returns
//! the combined output ranked by expected gain.

mod index;
mod join;
mod maintenance;
mod memory;
mod parallel;
mod rewrite;
mod sort;
pub mod support;

pub use index::{MissingIndexRule, SeqScanLargeTableRule, SkewStatsRule};
pub use join::{CorrelatedSubqueryRule, JoinOrderRule, NPlusOneRule};
pub use maintenance::{AutovacuumRule, BitmapRecheckRule, BloatRule, PartitioningRule};
pub use memory::{HashSpillRule, SortSpillRule, WorkMemRule};
pub use parallel::ParallelDisabledRule;
pub use rewrite::{CteInlineRule, FunctionVolatilityRule, QueryRewriteRule};
pub use sort::OrderByRule;

use crate::explain::Plan;
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single piece of advice emitted by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    /// Short stable identifier of the emitting rule family, e.g. "index"
    pub category: String,
    pub title: String,
    pub detail: String,
    /// Heuristic improvement in percent, within 0..=100
    pub expected_gain_pct: f64,
    /// Suggested DDL or session statement, if the rule can produce one
    pub ddl: Option<String>,
}

impl Recommendation {
    /// Creates a new recommendation, clamping the gain to 0..=100
    pub fn new(
        priority: Priority,
        category: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
        expected_gain_pct: f64,
    ) -> Self {
        let expected_gain_pct = if expected_gain_pct.is_nan() {
            0.0
        } else {
            expected_gain_pct.clamp(0.0, 100.0)
        };
        Self {
            priority,
            category: category.into(),
            title: title.into(),
            detail: detail.into(),
            expected_gain_pct,
            ddl: None,
        }
    }

    /// Attaches a DDL suggestion
    pub fn with_ddl(mut self, ddl: impl Into<String>) -> Self {
        self.ddl = Some(ddl.into());
        self
    }
}

/// An advisory rule
///
/// Rules are pure: the same query, plan and settings always produce the
/// same recommendations in the same order.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Stable rule name used in logs
    fn name(&self) -> &'static str;

    fn analyze(
        &self,
        query: &BoundQuery,
        plan: &Plan,
        settings: &PlannerSettings,
    ) -> Vec<Recommendation>;
}

/// Sorts recommendations by descending expected gain
///
/// The sort is stable, so equal gains keep their incoming order.
pub fn rank(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.expected_gain_pct.total_cmp(&a.expected_gain_pct));
}

/// Runs an ordered set of rules
#[derive(Debug)]
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl RuleEngine {
    /// Creates an engine running `rules` in the given order
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Creates an engine with no rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule to the end of the registration order
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Appends a boxed rule
    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules, in registration order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule in order and ranks the combined output
    ///
    /// Ties in expected gain keep registration order, then emission order.
    pub fn evaluate(
        &self,
        query: &BoundQuery,
        plan: &Plan,
        settings: &PlannerSettings,
    ) -> Vec<Recommendation> {
        let mut out: Vec<Recommendation> = self
            .rules
            .iter()
            .flat_map(|rule| {
                let recs = rule.analyze(query, plan, settings);
                tracing::trace!(rule = rule.name(), emitted = recs.len(), "rule evaluated");
                recs
            })
            .collect();
        rank(&mut out);
        tracing::debug!(
            rules = self.rules.len(),
            recommendations = out.len(),
            "rule engine finished"
        );
        out
    }

    /// Runs the rules on the rayon pool
    ///
    /// Output is identical to [`RuleEngine::evaluate`]: per-rule results are
    /// collected in registration order before ranking.
    pub fn evaluate_parallel(
        &self,
        query: &BoundQuery,
        plan: &Plan,
        settings: &PlannerSettings,
    ) -> Vec<Recommendation> {
        let per_rule: Vec<Vec<Recommendation>> = self
            .rules
            .par_iter()
            .map(|rule| rule.analyze(query, plan, settings))
            .collect();
        let mut out: Vec<Recommendation> = per_rule.into_iter().flatten().collect();
        rank(&mut out);
        tracing::debug!(
            rules = self.rules.len(),
            recommendations = out.len(),
            "parallel rule engine finished"
        );
        out
    }
}

/// Tunable rule thresholds
///
/// Defaults match the standard rule set. Every field is optional when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub page_size_bytes: u64,
    pub missing_index_min_pages: u64,
    pub missing_index_high_pages: u64,
    pub missing_index_max_cols: usize,
    pub n_plus_one_outer_rows_min: f64,
    pub n_plus_one_inner_rows_max: f64,
    pub autovacuum_big_pages: u64,
    pub partitioning_huge_pages: u64,
    pub bloat_min_rows: f64,
    pub bloat_min_width: u32,
    pub bitmap_recheck_min_rows: f64,
    pub cte_inline_big_rows: f64,
    pub correlated_subquery_big_rows_inner: f64,
    pub join_order_big_rows: f64,
    pub parallel_min_plan_bytes: u64,
    pub seq_scan_min_pages: u64,
    pub skew_stats_min_rows: f64,
    pub skew_stats_min_cols: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            page_size_bytes: 8192,
            missing_index_min_pages: 5_000,
            missing_index_high_pages: 50_000,
            missing_index_max_cols: 3,
            n_plus_one_outer_rows_min: 1_000.0,
            n_plus_one_inner_rows_max: 5.0,
            autovacuum_big_pages: 200_000,
            partitioning_huge_pages: 500_000,
            bloat_min_rows: 5_000_000.0,
            bloat_min_width: 200,
            bitmap_recheck_min_rows: 50_000.0,
            cte_inline_big_rows: 100_000.0,
            correlated_subquery_big_rows_inner: 10_000.0,
            join_order_big_rows: 100_000.0,
            parallel_min_plan_bytes: 256 << 20,
            seq_scan_min_pages: 1_000,
            skew_stats_min_rows: 100_000.0,
            skew_stats_min_cols: 2,
        }
    }
}

impl RuleThresholds {
    /// Builds the standard rule set, in registration order
    pub fn build_rules(&self) -> Vec<Box<dyn Rule>> {
        let page = self.page_size_bytes;
        vec![
            Box::new(
                MissingIndexRule::new(self.missing_index_min_pages, page, self.missing_index_max_cols)
                    .with_high_pages(self.missing_index_high_pages),
            ),
            Box::new(OrderByRule),
            Box::new(QueryRewriteRule),
            Box::new(NPlusOneRule::new(
                self.n_plus_one_outer_rows_min,
                self.n_plus_one_inner_rows_max,
            )),
            Box::new(WorkMemRule),
            Box::new(AutovacuumRule::new(self.autovacuum_big_pages, page)),
            Box::new(PartitioningRule::new(self.partitioning_huge_pages, page)),
            Box::new(BloatRule::new(self.bloat_min_rows, self.bloat_min_width)),
            Box::new(BitmapRecheckRule::new(self.bitmap_recheck_min_rows)),
            Box::new(CteInlineRule::new(self.cte_inline_big_rows)),
            Box::new(CorrelatedSubqueryRule::new(self.correlated_subquery_big_rows_inner)),
            Box::new(FunctionVolatilityRule),
            Box::new(HashSpillRule),
            Box::new(JoinOrderRule::new(self.join_order_big_rows)),
            Box::new(ParallelDisabledRule::new(self.parallel_min_plan_bytes)),
            Box::new(SeqScanLargeTableRule::new(self.seq_scan_min_pages, page)),
            Box::new(SkewStatsRule::new(self.skew_stats_min_rows, self.skew_stats_min_cols)),
            Box::new(SortSpillRule),
        ]
    }

    /// Builds a [`RuleEngine`] running the standard rule set
    pub fn rule_engine(&self) -> RuleEngine {
        RuleEngine::new(self.build_rules())
    }
}

/// The standard rule set with default thresholds
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    RuleThresholds::default().build_rules()
}
