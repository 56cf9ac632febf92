//! Preflight Analyzer - static analysis of PostgreSQL query plans
//!
//! This crate provides functionality for:
//! - Parsing `EXPLAIN (FORMAT JSON)` output into a plan tree
//! - Estimating I/O, memory, time and lock footprint before execution
//! - Running advisory rules that emit ranked recommendations

pub mod explain;
pub mod preflight;
pub mod rules;
pub mod settings;

pub use explain::*;
pub use preflight::{CostModel, LockLevel, PreflightEstimates, PreflightEstimator, infer_lock_level};
pub use rules::{Priority, Recommendation, Rule, RuleEngine, RuleThresholds, default_rules};
pub use settings::PlannerSettings;
