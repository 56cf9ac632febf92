//! Index and selectivity rules

use super::support::{equality_columns, like_patterns, node_pages, range_columns, relation_or};
use super::{Priority, Recommendation, Rule};
use crate::explain::Plan;
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;
use std::fmt::Write as _;

/// Flags large sequential scans whose filter an index could serve
#[derive(Debug, Clone)]
pub struct MissingIndexRule {
    min_pages: u64,
    high_pages: u64,
    page_size: u64,
    max_cols: usize,
}

impl Default for MissingIndexRule {
    fn default() -> Self {
        Self::new(5_000, 8192, 3)
    }
}

impl MissingIndexRule {
    pub fn new(min_pages: u64, page_size: u64, max_cols: usize) -> Self {
        Self {
            min_pages,
            high_pages: 50_000,
            page_size,
            max_cols,
        }
    }

    /// Page count at or above which the finding is raised to HIGH
    pub fn with_high_pages(mut self, high_pages: u64) -> Self {
        self.high_pages = high_pages;
        self
    }
}

impl Rule for MissingIndexRule {
    fn name(&self) -> &'static str {
        "missing_index"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for node in plan.iter_nodes().filter(|n| n.is_type("Seq Scan")) {
            let pages = node_pages(node, self.page_size);
            if pages < self.min_pages {
                continue;
            }
            let filter = node.filter.as_deref();
            let eq = equality_columns(filter);
            let rng = range_columns(filter);
            let likes = like_patterns(filter);
            if eq.is_empty() && rng.is_empty() && likes.is_empty() {
                continue;
            }

            let rel = relation_or(node, "target table");
            let eq_cols: Vec<&str> = eq.iter().take(self.max_cols).map(String::as_str).collect();
            let rng_cols: Vec<&str> = rng.iter().take(self.max_cols).map(String::as_str).collect();
            let (prefix_likes, leading_likes): (Vec<_>, Vec<_>) =
                likes.iter().partition(|(_, pattern)| !pattern.starts_with('%'));

            let mut detail = format!("Full scan of ~{pages} pages. Suggestions:\n");
            if !eq_cols.is_empty() {
                let _ = writeln!(detail, "- B-tree index on equality columns: ({})", eq_cols.join(", "));
            }
            if !rng_cols.is_empty() {
                let _ = writeln!(
                    detail,
                    "- B-tree index with range columns leading: ({})",
                    rng_cols.join(", ")
                );
            }
            if !prefix_likes.is_empty() {
                let cols: Vec<&str> = prefix_likes.iter().map(|(col, _)| col.as_str()).collect();
                let _ = writeln!(
                    detail,
                    "- Index for LIKE 'abc%' (btree, or btree text_pattern_ops) on: ({})",
                    cols.join(", ")
                );
            }
            if !leading_likes.is_empty() {
                let _ = writeln!(
                    detail,
                    "- For LIKE '%abc' use GIN with pg_trgm: CREATE INDEX ON {rel} USING gin (col gin_trgm_ops)"
                );
            }
            detail.push_str("- Consider a partial index if the predicate is stable\n");

            let high = pages >= self.high_pages;
            let mut rec = Recommendation::new(
                if high { Priority::High } else { Priority::Medium },
                "index",
                format!("Possible missing index on {rel}"),
                detail,
                if high { 45.0 } else { 25.0 },
            );

            let mut ddl_cols: Vec<&str> = Vec::new();
            for &col in eq_cols.iter().chain(rng_cols.iter()) {
                let bare = col.rsplit('.').next().unwrap_or(col);
                if !ddl_cols.contains(&bare) && ddl_cols.len() < self.max_cols {
                    ddl_cols.push(bare);
                }
            }
            if !ddl_cols.is_empty() && node.relation_name.is_some() {
                rec = rec.with_ddl(format!(
                    "CREATE INDEX CONCURRENTLY ON {rel} ({})",
                    ddl_cols.join(", ")
                ));
            }
            out.push(rec);
        }
        out
    }
}

/// Flags large sequential scans with no selective predicate at all
#[derive(Debug, Clone)]
pub struct SeqScanLargeTableRule {
    min_pages: u64,
    page_size: u64,
}

impl Default for SeqScanLargeTableRule {
    fn default() -> Self {
        Self::new(1_000, 8192)
    }
}

impl SeqScanLargeTableRule {
    pub fn new(min_pages: u64, page_size: u64) -> Self {
        Self {
            min_pages,
            page_size,
        }
    }
}

impl Rule for SeqScanLargeTableRule {
    fn name(&self) -> &'static str {
        "seq_scan_large_table"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        plan.iter_nodes()
            .filter(|n| n.is_type("Seq Scan"))
            .filter_map(|node| {
                let pages = node_pages(node, self.page_size);
                let filter = node.filter.as_deref();
                let selective = !equality_columns(filter).is_empty() || !range_columns(filter).is_empty();
                if pages < self.min_pages || selective {
                    return None;
                }
                let rel = relation_or(node, "target table");
                Some(Recommendation::new(
                    Priority::High,
                    "seq-scan",
                    format!("Large Seq Scan without a selective filter: {rel}"),
                    format!(
                        "Scan is estimated at ~{pages} pages. Add an index (possibly partial), \
                         rewrite the WHERE clause, or consider partitioning."
                    ),
                    50.0,
                ))
            })
            .collect()
    }
}

/// Flags multi-column predicates on large row counts, where correlated
/// columns commonly skew the planner's selectivity estimates
#[derive(Debug, Clone)]
pub struct SkewStatsRule {
    min_rows: f64,
    min_cols: usize,
}

impl Default for SkewStatsRule {
    fn default() -> Self {
        Self::new(100_000.0, 2)
    }
}

impl SkewStatsRule {
    pub fn new(min_rows: f64, min_cols: usize) -> Self {
        Self { min_rows, min_cols }
    }
}

impl Rule for SkewStatsRule {
    fn name(&self) -> &'static str {
        "skew_stats"
    }

    fn analyze(&self, _query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for node in plan.iter_nodes() {
            let filter = node.filter.as_deref();
            let mut cols: Vec<String> = Vec::new();
            for col in equality_columns(filter).into_iter().chain(range_columns(filter)) {
                if !cols.contains(&col) {
                    cols.push(col);
                }
            }
            if cols.len() < self.min_cols || node.estimated_rows < self.min_rows {
                continue;
            }
            let rel = relation_or(node, "target table");
            out.push(Recommendation::new(
                Priority::Medium,
                "skew-stats",
                format!("Likely selectivity skew on {rel}"),
                format!(
                    "Multi-column predicate on {} leaves a large remainder. Create extended \
                     statistics (ndistinct/mcv/dependencies) and a partial or expression index \
                     matching the real predicate.",
                    cols.join(", ")
                ),
                10.0,
            ));
        }
        out
    }
}
