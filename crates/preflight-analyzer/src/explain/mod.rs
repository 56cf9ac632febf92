//! Query EXPLAIN Parser Module
//!
//! # Example
//!
//! ```
//! use preflight_analyzer::explain::parse_explain_json;
//!
//! let json = r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users", "Total Cost": 12.5}}]"#;
//! let plan = parse_explain_json(json).unwrap();
//! assert_eq!(plan.root.node_type, "Seq Scan");
//! assert_eq!(plan.total_cost, 12.5);
//! ```

pub mod plan;
pub mod postgres;

pub use plan::{Plan, PlanNode, PlanNodeIterator};
pub use postgres::{PlanParseError, parse_explain_json, parse_explain_value};
