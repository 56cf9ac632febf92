//! Table maintenance and layout rules

use super::support::{any_node, node_pages, range_columns, relation_or};
use super::{Priority, Recommendation, Rule};
use crate::explain::Plan;
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;
use regex::Regex;
use std::sync::LazyLock;

static DATE_LIKE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*(created|date|dt|time|timestamp).*$").expect("valid regex")
});

fn is_dml(sql: &str) -> bool {
    let head = sql.trim_start();
    ["UPDATE", "DELETE", "INSERT"].iter().any(|kw| {
        head.get(..kw.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
    })
}

/// Flags DML touching a very large sequentially scanned table
///
/// Emits at most one recommendation, for the first qualifying scan.
#[derive(Debug, Clone)]
pub struct AutovacuumRule {
    big_pages: u64,
    page_size: u64,
}

impl Default for AutovacuumRule {
    fn default() -> Self {
        Self::new(200_000, 8192)
    }
}

impl AutovacuumRule {
    pub fn new(big_pages: u64, page_size: u64) -> Self {
        Self {
            big_pages,
            page_size,
        }
    }
}

impl Rule for AutovacuumRule {
    fn name(&self) -> &'static str {
        "autovacuum"
    }

    fn analyze(&self, query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        if !is_dml(query.sql()) {
            return Vec::new();
        }
        plan.iter_nodes()
            .filter(|n| n.is_type("Seq Scan"))
            .find_map(|node| {
                let pages = node_pages(node, self.page_size);
                (pages >= self.big_pages).then(|| {
                    let rel = relation_or(node, "target table");
                    Recommendation::new(
                        Priority::Medium,
                        "autovacuum",
                        format!("Autovacuum may be lagging on {rel}"),
                        format!(
                            "Large table (~{pages} pages) is touched by DML. Consider per-table settings:\n\
                             - lower autovacuum_vacuum_scale_factor (e.g. 0.05) and raise autovacuum_vacuum_threshold for large volumes\n\
                             - lower autovacuum_analyze_scale_factor to keep statistics fresh\n\
                             - tune autovacuum_cost_limit and autovacuum_cost_delay for the storage\n\
                             - run VACUUM/ANALYZE regularly in a maintenance window"
                        ),
                        15.0,
                    )
                })
            })
            .into_iter()
            .collect()
    }
}

/// Flags huge tables scanned with a date-like range predicate
#[derive(Debug, Clone)]
pub struct PartitioningRule {
    huge_pages: u64,
    page_size: u64,
}

impl Default for PartitioningRule {
    fn default() -> Self {
        Self::new(500_000, 8192)
    }
}

impl PartitioningRule {
    pub fn new(huge_pages: u64, page_size: u64) -> Self {
        Self {
            huge_pages,
            page_size,
        }
    }
}

impl Rule for PartitioningRule {
    fn name(&self) -> &'static str {
        "partitioning"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for node in plan.iter_nodes().filter(|n| n.is_type("Seq Scan")) {
            let pages = node_pages(node, self.page_size);
            if pages < self.huge_pages {
                continue;
            }
            let rng = range_columns(node.filter.as_deref());
            if !rng.iter().any(|col| DATE_LIKE_REGEX.is_match(col)) {
                continue;
            }
            let rel = relation_or(node, "target table");
            out.push(Recommendation::new(
                Priority::Medium,
                "partitioning",
                format!("Table {rel} looks like a partitioning candidate"),
                format!(
                    "Full scan of ~{pages} pages with a range filter ({}). Consider RANGE \
                     partitioning by date or id, key indexes on the partitions, and correct \
                     CHECK constraints for partition pruning.",
                    rng.join(", ")
                ),
                22.0,
            ));
        }
        out
    }
}

/// Flags wide, very large sequential scans as a sign of table bloat
///
/// Emits at most one recommendation per plan.
#[derive(Debug, Clone)]
pub struct BloatRule {
    min_rows: f64,
    min_width: u32,
}

impl Default for BloatRule {
    fn default() -> Self {
        Self::new(5_000_000.0, 200)
    }
}

impl BloatRule {
    pub fn new(min_rows: f64, min_width: u32) -> Self {
        Self {
            min_rows,
            min_width,
        }
    }
}

impl Rule for BloatRule {
    fn name(&self) -> &'static str {
        "bloat"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let hit = any_node(plan, |n| {
            n.is_type("Seq Scan") && n.estimated_rows >= self.min_rows && n.plan_width >= self.min_width
        });
        if !hit {
            return Vec::new();
        }
        vec![Recommendation::new(
            Priority::Low,
            "bloat",
            "Suspected table or index bloat",
            "Wide rows and large full scans. Check bloat; schedule VACUUM (FULL) or REINDEX \
             in a maintenance window.",
            20.0,
        )]
    }
}

/// Flags bitmap heap scans over many rows, which tend to recheck heavily
#[derive(Debug, Clone)]
pub struct BitmapRecheckRule {
    min_rows: f64,
}

impl Default for BitmapRecheckRule {
    fn default() -> Self {
        Self::new(50_000.0)
    }
}

impl BitmapRecheckRule {
    pub fn new(min_rows: f64) -> Self {
        Self { min_rows }
    }
}

impl Rule for BitmapRecheckRule {
    fn name(&self) -> &'static str {
        "bitmap_recheck"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        plan.iter_nodes()
            .filter(|n| n.is_type("Bitmap Heap Scan") && n.estimated_rows >= self.min_rows)
            .map(|node| {
                let rel = relation_or(node, "target table");
                Recommendation::new(
                    Priority::Medium,
                    "bitmap-recheck",
                    format!("Bitmap Heap Scan over a large set: {rel}"),
                    "High chance of lossy rechecks. Consider a different or partial index and \
                     a tighter predicate.",
                    12.0,
                )
            })
            .collect()
    }
}
