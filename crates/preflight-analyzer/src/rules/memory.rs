//! Memory budget rules: work_mem sizing, hash spills, sort spills

use super::support::{human_bytes, node_bytes, sort_keys_from_sql, work_mem_bytes};
use super::{Priority, Recommendation, Rule};
use crate::explain::{Plan, PlanNode};
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;

const MIB: u64 = 1 << 20;

fn sort_need(node: &PlanNode) -> u64 {
    node_bytes(node).saturating_mul(2)
}

fn hash_need(node: &PlanNode) -> u64 {
    (node_bytes(node) as f64 * 1.5) as u64
}

/// Compares the worst sort or hash memory demand against work_mem
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkMemRule;

impl Rule for WorkMemRule {
    fn name(&self) -> &'static str {
        "work_mem"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, settings: &PlannerSettings) -> Vec<Recommendation> {
        let work_mem = work_mem_bytes(settings);
        let mut worst_need: u64 = 0;
        let mut worst_node: Option<&str> = None;
        let mut max_sort: u64 = 0;
        let mut max_hash: u64 = 0;

        for node in plan.iter_nodes() {
            let kind = node.kind();
            let need = if kind == "sort" {
                let need = sort_need(node);
                max_sort = max_sort.max(need);
                need
            } else if kind.contains("hash") {
                let need = hash_need(node);
                max_hash = max_hash.max(need);
                need
            } else {
                continue;
            };
            if need > worst_need {
                worst_need = need;
                worst_node = Some(node.node_type.as_str());
            }
        }

        if worst_need <= work_mem {
            return Vec::new();
        }

        let target_mb = worst_need
            .div_ceil(MIB)
            .max(u64::from(settings.work_mem_mb));

        let mut detail = format!(
            "Node {} needs ~{} while work_mem is ~{}.\n",
            worst_node.unwrap_or("Sort/Hash"),
            human_bytes(worst_need),
            human_bytes(work_mem)
        );
        if max_sort > 0 {
            detail.push_str(&format!("- Largest sort estimate: ~{}\n", human_bytes(max_sort)));
        }
        if max_hash > 0 {
            detail.push_str(&format!("- Largest hash estimate: ~{}\n", human_bytes(max_hash)));
        }
        detail.push_str(&format!(
            "- Suggestions: raise work_mem for this session to ~{target_mb} MB, add an index \
             serving the ORDER BY or aggregate, push LIMIT down, shrink intermediate results."
        ));

        vec![
            Recommendation::new(
                Priority::Medium,
                "work-mem",
                "work_mem too small for Sort/Hash",
                detail,
                18.0,
            )
            .with_ddl(format!("SET work_mem = '{target_mb}MB'")),
        ]
    }
}

/// Flags each hash node whose estimated table exceeds work_mem
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSpillRule;

impl Rule for HashSpillRule {
    fn name(&self) -> &'static str {
        "hash_spill"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, settings: &PlannerSettings) -> Vec<Recommendation> {
        let work_mem = work_mem_bytes(settings);
        plan.iter_nodes()
            .filter(|n| {
                let kind = n.kind();
                kind.contains("hash join") || kind == "hash" || kind.contains("hashagg")
            })
            .filter_map(|node| {
                let need = hash_need(node);
                (need > work_mem).then(|| {
                    Recommendation::new(
                        Priority::Medium,
                        "hash-spill",
                        format!(
                            "Hash spill: needs ~{} with work_mem ~{}",
                            human_bytes(need),
                            human_bytes(work_mem)
                        ),
                        "Likely to spill to disk. Raise work_mem for this query, consider \
                         disabling hash aggregation for it, or rewrite the aggregate or join.",
                        18.0,
                    )
                })
            })
            .collect()
    }
}

/// Flags each Sort node whose input exceeds work_mem
#[derive(Debug, Clone, Copy, Default)]
pub struct SortSpillRule;

impl Rule for SortSpillRule {
    fn name(&self) -> &'static str {
        "sort_spill"
    }

    fn analyze(&self, query: &BoundQuery, plan: &Plan, settings: &PlannerSettings) -> Vec<Recommendation> {
        let work_mem = work_mem_bytes(settings);
        let mut recs = Vec::new();
        for node in plan.iter_nodes().filter(|n| n.is_type("Sort")) {
            let need = sort_need(node);
            if need <= work_mem {
                continue;
            }
            let keys = sort_keys_from_sql(query.sql());
            let keys = if keys.is_empty() {
                "<unknown>".to_string()
            } else {
                keys.join(", ")
            };
            recs.push(Recommendation::new(
                Priority::Medium,
                "sort-spill",
                format!(
                    "Sort spill: needs ~{}, work_mem ~{}",
                    human_bytes(need),
                    human_bytes(work_mem)
                ),
                format!(
                    "Keys: {keys}. Raise work_mem for this query, add an index serving the \
                     ORDER BY, push the limit down."
                ),
                20.0,
            ));
        }
        recs
    }
}
