//! ORDER BY rules

use super::support::sort_keys_from_sql;
use super::{Priority, Recommendation, Rule};
use crate::explain::Plan;
use crate::settings::PlannerSettings;
use preflight_core::BoundQuery;
use regex::Regex;
use std::sync::LazyLock;

static LIMIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+(\d+)").expect("valid regex"));

static RANDOM_ORDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\border\s+by\s+random\(\)").expect("valid regex"));

/// Flags `ORDER BY random()` and plans that sort
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderByRule;

impl Rule for OrderByRule {
    fn name(&self) -> &'static str {
        "order_by"
    }

    fn analyze(&self, query: &BoundQuery, plan: &Plan, _settings: &PlannerSettings) -> Vec<Recommendation> {
        let sql = query.sql();
        let mut recs = Vec::new();

        if RANDOM_ORDER_REGEX.is_match(sql) {
            recs.push(Recommendation::new(
                Priority::High,
                "order-by",
                "ORDER BY random() is very expensive",
                "Random ordering forces a full sort of the whole input. Pre-select random ids, \
                 use TABLESAMPLE or a stored random key, or pick rows by offset from a \
                 pseudo-random seed.",
                60.0,
            ));
        }

        let Some(top_sort) = plan.iter_nodes().find(|n| n.is_type("Sort")) else {
            return recs;
        };

        let keys = sort_keys_from_sql(sql);
        let limit = LIMIT_REGEX
            .captures(sql)
            .and_then(|caps| caps[1].parse::<u64>().ok());
        let sorted_rows = top_sort.estimated_rows.max(0.0) as u64;

        let mut detail = if keys.is_empty() {
            "Sort detected on: <unknown>.".to_string()
        } else {
            format!("Sort detected on: {}.", keys.join(", "))
        };
        if let Some(limit) = limit
            && sorted_rows > limit.saturating_mul(10)
        {
            detail.push_str(&format!(
                " Far more rows are sorted than returned (LIMIT {limit}); push the limit down \
                 or add an index."
            ));
        }
        if keys.iter().any(|k| k.contains('(')) {
            detail.push_str(" ORDER BY uses an expression; it needs a matching expression index.");
        }
        detail.push_str(
            " Suggestions: index matching the ORDER BY (column order and direction), \
             remove redundant sorts, push LIMIT down.",
        );

        recs.push(Recommendation::new(
            Priority::Medium,
            "order-by",
            "Suboptimal sort",
            detail,
            18.0,
        ));
        recs
    }
}
