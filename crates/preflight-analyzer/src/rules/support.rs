//! Shared helpers for rules
//!
//! The predicate extractors are lexical heuristics over the engine's filter
//! text. They recognise simple `col = literal`, `col < literal` and
//! `col LIKE 'pattern'` shapes and will miss anything more elaborate.

use crate::explain::{Plan, PlanNode};
use crate::settings::PlannerSettings;
use regex::Regex;
use std::sync::LazyLock;

pub use crate::preflight::node_bytes;

static EQUALITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-zA-Z_][\w.]*)\s*=\s*(?:\$\d+|\?|\d+|'[^']*')").expect("valid regex")
});

static RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-zA-Z_][\w.]*)\s*(?:>=|<=|>|<)\s*(?:\$\d+|\?|\d+)").expect("valid regex")
});

static LIKE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-zA-Z_][\w.]*)\s+LIKE\s+'([^']+)'").expect("valid regex")
});

static ORDER_BY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\border\s+by\s+(.+?)(?:\blimit\b|\boffset\b|$)").expect("valid regex")
});

static ORDER_MODIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\basc\b|\bdesc\b|\bnulls\s+first\b|\bnulls\s+last\b|\bcollate\s+\S+")
        .expect("valid regex")
});

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Visits every node of the plan in pre-order
pub fn walk<'a>(plan: &'a Plan, mut visit: impl FnMut(&'a PlanNode)) {
    for node in plan.iter_nodes() {
        visit(node);
    }
}

/// Returns true if any node satisfies `predicate`, stopping at the first hit
pub fn any_node(plan: &Plan, predicate: impl FnMut(&PlanNode) -> bool) -> bool {
    plan.iter_nodes().any(predicate)
}

/// Whole pages a node's estimated output occupies
pub fn node_pages(node: &PlanNode, page_size: u64) -> u64 {
    node_bytes(node) / page_size.max(1)
}

pub fn work_mem_bytes(settings: &PlannerSettings) -> u64 {
    settings.work_mem_bytes()
}

/// Formats a byte count with the largest whole binary unit
pub fn human_bytes(bytes: u64) -> String {
    const KIB: u64 = 1 << 10;
    const MIB: u64 = 1 << 20;
    const GIB: u64 = 1 << 30;
    if bytes >= GIB {
        format!("{} GiB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Columns compared for equality against a literal or placeholder
pub fn equality_columns(filter: Option<&str>) -> Vec<String> {
    capture_first_group(&EQUALITY_REGEX, filter)
}

/// Columns compared with `<`, `<=`, `>` or `>=` against a literal or placeholder
pub fn range_columns(filter: Option<&str>) -> Vec<String> {
    capture_first_group(&RANGE_REGEX, filter)
}

/// `(column, pattern)` pairs of `LIKE` predicates
pub fn like_patterns(filter: Option<&str>) -> Vec<(String, String)> {
    let Some(text) = filter else {
        return Vec::new();
    };
    LIKE_REGEX
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

fn capture_first_group(regex: &Regex, filter: Option<&str>) -> Vec<String> {
    let Some(text) = filter else {
        return Vec::new();
    };
    regex
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Extracts the ORDER BY keys from statement text
///
/// Keys are split at top-level commas only, so `coalesce(a, b)` stays whole.
/// Direction, NULLS placement and COLLATE clauses are stripped.
pub fn sort_keys_from_sql(sql: &str) -> Vec<String> {
    let Some(caps) = ORDER_BY_REGEX.captures(sql) else {
        return Vec::new();
    };
    let payload = caps[1].trim();

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    for ch in payload.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
        .iter()
        .map(|part| cleanup_order_expr(part))
        .filter(|key| !key.trim().is_empty())
        .collect()
}

fn cleanup_order_expr(raw: &str) -> String {
    let stripped = ORDER_MODIFIER_REGEX.replace_all(raw, "");
    let collapsed = WHITESPACE_REGEX.replace_all(&stripped, " ");
    collapsed.trim().trim_matches(',').to_string()
}

/// Relation name of a node, or `fallback` when the plan does not name one
pub fn relation_or<'a>(node: &'a PlanNode, fallback: &'a str) -> &'a str {
    node.relation_name.as_deref().unwrap_or(fallback)
}
