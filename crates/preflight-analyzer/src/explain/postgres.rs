//! PostgreSQL EXPLAIN Parser
//!
//! Parses `EXPLAIN (FORMAT JSON)` output into a [`Plan`].
//!
//! # Examples
//!
//! ```
//! use preflight_analyzer::explain::postgres::parse_explain_json;
//!
//! let json_output = r#"[
//!   {
//!     "Plan": {
//!       "Node Type": "Seq Scan",
//!       "Relation Name": "users",
//!       "Total Cost": 10.0,
//!       "Plan Rows": 100,
//!       "Plan Width": 36
//!     }
//!   }
//! ]"#;
//!
//! let plan = parse_explain_json(json_output).unwrap();
//! assert!(plan.has_node_type("seq scan"));
//! ```

use crate::explain::plan::{Plan, PlanNode};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when parsing PostgreSQL EXPLAIN output
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unexpected EXPLAIN JSON structure: expected a non-empty array or an object with \"Plan\"")]
    UnexpectedStructure,

    #[error("Missing Plan object in EXPLAIN output")]
    MissingPlan,
}

/// Result type for PostgreSQL EXPLAIN parsing
pub type Result<T> = std::result::Result<T, PlanParseError>;

/// Parses PostgreSQL EXPLAIN (FORMAT JSON) output
///
/// Accepts either the array the server returns (the first element is used)
/// or a bare object carrying `"Plan"`. Unknown fields are ignored and JSON
/// nulls are treated as absent.
pub fn parse_explain_json(json: &str) -> Result<Plan> {
    let value: Value = serde_json::from_str(json)?;
    parse_explain_value(&value)
}

/// Parses EXPLAIN output that has already been decoded, e.g. a `json`
/// column read by a driver
pub fn parse_explain_value(value: &Value) -> Result<Plan> {
    let root_obj = match value {
        Value::Array(arr) if !arr.is_empty() => &arr[0],
        Value::Object(obj) if obj.contains_key("Plan") => value,
        _ => return Err(PlanParseError::UnexpectedStructure),
    };

    let plan_obj = match root_obj.get("Plan") {
        Some(plan) if !plan.is_null() => plan,
        _ => return Err(PlanParseError::MissingPlan),
    };

    Ok(Plan::new(convert_tree(plan_obj)))
}

struct Frame<'a> {
    node: PlanNode,
    children: &'a [Value],
    next: usize,
}

impl<'a> Frame<'a> {
    fn new(value: &'a Value) -> Self {
        let children = value
            .get("Plans")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Self {
            node: parse_plan_node(value),
            children,
            next: 0,
        }
    }
}

/// Converts a JSON plan object and its descendants using an explicit stack
fn convert_tree(root: &Value) -> PlanNode {
    let mut current = Frame::new(root);
    let mut ancestors: Vec<Frame<'_>> = Vec::new();
    loop {
        let children = current.children;
        if let Some(child) = children.get(current.next) {
            current.next += 1;
            ancestors.push(std::mem::replace(&mut current, Frame::new(child)));
            continue;
        }
        match ancestors.pop() {
            Some(mut parent) => {
                parent.node.plans.push(current.node);
                current = parent;
            }
            None => return current.node,
        }
    }
}

/// Parses a single plan node's own fields from JSON, without children
fn parse_plan_node(value: &Value) -> PlanNode {
    let mut node = PlanNode::new(opt_text(value, "Node Type").unwrap_or_else(|| "Unknown".into()));

    node.relation_name = opt_text(value, "Relation Name");
    node.schema = opt_text(value, "Schema");
    node.alias = opt_text(value, "Alias");
    node.filter = opt_text(value, "Filter");
    node.index_cond = opt_text(value, "Index Cond");

    node.estimated_rows = value.get("Plan Rows").and_then(Value::as_f64).unwrap_or(0.0);
    node.plan_width = value
        .get("Plan Width")
        .and_then(Value::as_u64)
        .map(|w| u32::try_from(w).unwrap_or(u32::MAX))
        .unwrap_or(0);
    node.total_cost = value.get("Total Cost").and_then(Value::as_f64).unwrap_or(0.0);

    node
}

fn opt_text(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
