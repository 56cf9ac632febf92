//! Query shape rules that suggest rewriting the statement

use super::{Priority, Recommendation, Rule};
use crate::explain::Plan;
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;
use regex::Regex;
use std::sync::LazyLock;

static OR_EQUALITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\w+)\s*=\s*(?:\$\d+|\?|\d+|'[^']*')\s+OR\s+(\w+)\s*=\s*(?:\$\d+|\?|\d+|'[^']*')",
    )
    .expect("valid regex")
});

static FUNCTION_ON_COLUMN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+)\s*\(\s*([a-zA-Z_][\w.]*)\s*\)").expect("valid regex")
});

static LEADING_WILDCARD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-zA-Z_][\w.]*)\s+LIKE\s+'%[^']*'").expect("valid regex")
});

static NOT_IN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bNOT\s+IN\s*\(").expect("valid regex"));

/// Detects predicate shapes that defeat index use
///
/// Looks at the distinct filter texts of the plan, joined with AND, and falls
/// back to the statement text when the plan carries no filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryRewriteRule;

impl QueryRewriteRule {
    fn predicate_text(query: &BoundQuery, plan: &Plan) -> String {
        let mut filters: Vec<&str> = Vec::new();
        for filter in plan.iter_nodes().filter_map(|n| n.filter.as_deref()) {
            if !filters.contains(&filter) {
                filters.push(filter);
            }
        }
        let joined = filters.join(" AND ");
        if joined.trim().is_empty() {
            query.sql().to_string()
        } else {
            joined
        }
    }
}

impl Rule for QueryRewriteRule {
    fn name(&self) -> &'static str {
        "query_rewrite"
    }

    fn analyze(&self, query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let text = Self::predicate_text(query, plan);
        let mut recs = Vec::new();

        if OR_EQUALITY_REGEX.is_match(&text) {
            recs.push(Recommendation::new(
                Priority::Medium,
                "rewrite",
                "OR predicate may prevent index use",
                "Consider rewriting as UNION ALL of two indexable queries, or a composite \
                 index with the right column order.",
                12.0,
            ));
        }
        if LEADING_WILDCARD_REGEX.is_match(&text) {
            recs.push(Recommendation::new(
                Priority::Medium,
                "rewrite",
                "LIKE with a leading '%' cannot use a B-tree",
                "Use GIN with pg_trgm (gin_trgm_ops) or rewrite the predicate. For 'abc%' a \
                 B-tree works (text_pattern_ops).",
                20.0,
            ));
        }
        if FUNCTION_ON_COLUMN_REGEX.is_match(&text) {
            recs.push(Recommendation::new(
                Priority::Low,
                "rewrite",
                "Function applied to a column in WHERE",
                "Add an expression index, or rewrite so the function applies to the constant \
                 instead of the column.",
                8.0,
            ));
        }
        if NOT_IN_REGEX.is_match(&text) {
            recs.push(Recommendation::new(
                Priority::Low,
                "rewrite",
                "NOT IN often leads to full scans",
                "Consider an anti-join (LEFT JOIN ... WHERE right IS NULL) or NOT EXISTS.",
                6.0,
            ));
        }
        recs
    }
}

/// Flags large CTE scans and materializations that block inlining
#[derive(Debug, Clone)]
pub struct CteInlineRule {
    big_rows: f64,
}

impl Default for CteInlineRule {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

impl CteInlineRule {
    pub fn new(big_rows: f64) -> Self {
        Self { big_rows }
    }
}

impl Rule for CteInlineRule {
    fn name(&self) -> &'static str {
        "cte_inline"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        plan.iter_nodes()
            .filter(|n| {
                let kind = n.kind();
                (kind.contains("cte scan") || kind.contains("materialize"))
                    && n.estimated_rows > self.big_rows
            })
            .map(|node| {
                Recommendation::new(
                    Priority::Medium,
                    "cte-inline",
                    format!("Large CTE/Materialize (~{} rows)", node.estimated_rows),
                    "On PostgreSQL 12+ mark the CTE NOT MATERIALIZED when safe, or drop the \
                     CTE so the planner can inline it.",
                    15.0,
                )
            })
            .collect()
    }
}

/// Reminds to check function volatility when the plan evaluates functions
///
/// Emits at most one recommendation per plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionVolatilityRule;

impl Rule for FunctionVolatilityRule {
    fn name(&self) -> &'static str {
        "function_volatility"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let has_function = plan
            .iter_nodes()
            .any(|n| n.is_type("Function Scan") || n.is_type("Result"));
        if !has_function {
            return Vec::new();
        }
        vec![Recommendation::new(
            Priority::Low,
            "function-volatility",
            "Check function VOLATILITY",
            "IMMUTABLE or STABLE functions allow expression indexes and simpler plans.",
            5.0,
        )]
    }
}
