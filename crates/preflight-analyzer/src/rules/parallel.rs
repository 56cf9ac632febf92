use super::support::{human_bytes, node_bytes, walk};
use super::{Priority, Recommendation, Rule};
use crate::explain::Plan;
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;

/// Flags large plans that run without any Gather node
#[derive(Debug, Clone)]
pub struct ParallelDisabledRule {
    min_plan_bytes: u64,
}

impl Default for ParallelDisabledRule {
    fn default() -> Self {
        Self::new(256 << 20)
    }
}

impl ParallelDisabledRule {
    pub fn new(min_plan_bytes: u64) -> Self {
        Self { min_plan_bytes }
    }
}

impl Rule for ParallelDisabledRule {
    fn name(&self) -> &'static str {
        "parallel_disabled"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut total: u64 = 0;
        let mut has_gather = false;
        walk(plan, |node| {
            total = total.saturating_add(node_bytes(node));
            has_gather |= node.type_contains("Gather");
        });
        if total < self.min_plan_bytes || has_gather {
            return Vec::new();
        }
        vec![Recommendation::new(
            Priority::Medium,
            "parallel",
            format!("No parallelism for ~{} of plan output", human_bytes(total)),
            "Check that the query is parallel safe and review cluster settings such as \
             max_parallel_workers_per_gather.",
            20.0,
        )]
    }
}
