//! Join shape rules

use super::support::{equality_columns, relation_or};
use super::{Priority, Recommendation, Rule};
use crate::explain::{Plan, PlanNode};
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;

/// Outer and inner inputs of a join node with at least two children
fn join_inputs(node: &PlanNode) -> Option<(&PlanNode, &PlanNode)> {
    match node.plans.as_slice() {
        [outer, inner, ..] => Some((outer, inner)),
        _ => None,
    }
}

/// Flags nested loops that look like a per-row lookup issued many times
#[derive(Debug, Clone)]
pub struct NPlusOneRule {
    outer_rows_min: f64,
    inner_rows_max: f64,
}

impl Default for NPlusOneRule {
    fn default() -> Self {
        Self::new(1_000.0, 5.0)
    }
}

impl NPlusOneRule {
    pub fn new(outer_rows_min: f64, inner_rows_max: f64) -> Self {
        Self {
            outer_rows_min,
            inner_rows_max,
        }
    }
}

impl Rule for NPlusOneRule {
    fn name(&self) -> &'static str {
        "n_plus_one"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for node in plan.iter_nodes().filter(|n| n.type_contains("Nested Loop")) {
            let Some((outer, inner)) = join_inputs(node) else {
                continue;
            };
            let inner_lookup = (inner.is_type("Seq Scan") || inner.type_contains("Index"))
                && inner.estimated_rows <= self.inner_rows_max;
            if !inner_lookup || outer.estimated_rows < self.outer_rows_min {
                continue;
            }
            let rel = relation_or(inner, "inner table");
            out.push(Recommendation::new(
                Priority::High,
                "n+1",
                "Suspected N+1 (Nested Loop)",
                format!(
                    "Outer input ~{} rows, inner lookup on {rel} ~{} rows each. Fold into one \
                     query with JOIN/IN, batch the lookups (IN/VALUES), or cache.",
                    outer.estimated_rows, inner.estimated_rows
                ),
                35.0,
            ));
        }
        out
    }
}

/// Flags nested loops whose inner side rescans a large unfiltered table
#[derive(Debug, Clone)]
pub struct CorrelatedSubqueryRule {
    big_rows_inner: f64,
}

impl Default for CorrelatedSubqueryRule {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

impl CorrelatedSubqueryRule {
    pub fn new(big_rows_inner: f64) -> Self {
        Self { big_rows_inner }
    }
}

impl Rule for CorrelatedSubqueryRule {
    fn name(&self) -> &'static str {
        "correlated_subquery"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for node in plan.iter_nodes().filter(|n| n.type_contains("Nested Loop")) {
            let Some((_, inner)) = join_inputs(node) else {
                continue;
            };
            let suspicious = inner.estimated_rows > self.big_rows_inner
                && inner.is_type("Seq Scan")
                && equality_columns(inner.filter.as_deref()).is_empty();
            if suspicious {
                out.push(Recommendation::new(
                    Priority::High,
                    "correlated-subquery",
                    "Possible correlated subquery",
                    format!(
                        "Inner side ~{} rows with no index or selective filter. Rewrite as a \
                         JOIN or CTE, or materialize it with an index.",
                        inner.estimated_rows
                    ),
                    45.0,
                ));
            }
        }
        out
    }
}

/// Flags join orders that pair large inputs badly
#[derive(Debug, Clone)]
pub struct JoinOrderRule {
    big_rows: f64,
}

impl Default for JoinOrderRule {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

impl JoinOrderRule {
    pub fn new(big_rows: f64) -> Self {
        Self { big_rows }
    }
}

impl Rule for JoinOrderRule {
    fn name(&self) -> &'static str {
        "join_order"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut recs = Vec::new();
        let joins = plan
            .iter_nodes()
            .filter(|n| n.type_contains("Join") || n.type_contains("Nested Loop"));
        for node in joins {
            let Some((left, right)) = join_inputs(node) else {
                continue;
            };
            if node.type_contains("Nested Loop")
                && right.estimated_rows > self.big_rows
                && right.is_type("Seq Scan")
            {
                recs.push(Recommendation::new(
                    Priority::High,
                    "join-order",
                    "Nested Loop with a large inner table",
                    format!(
                        "Inner side ~{} rows without an index. Index the join keys, reorder \
                         the join, or consider a Hash or Merge join.",
                        right.estimated_rows
                    ),
                    40.0,
                ));
            } else if node.type_contains("Hash")
                && left.estimated_rows > self.big_rows
                && right.estimated_rows > self.big_rows
            {
                recs.push(Recommendation::new(
                    Priority::Medium,
                    "join-order",
                    "Hash Join over two large inputs",
                    "Check the cardinality estimates and composite indexes on the join keys; \
                     the join may need reordering.",
                    25.0,
                ));
            }
        }
        recs
    }
}
