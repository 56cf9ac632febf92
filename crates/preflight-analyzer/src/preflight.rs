//! Preflight resource estimation
//!
//! Predicts the I/O, memory, time and lock footprint of a statement from its
//! plan alone. The figures are heuristics built on planner estimates.

use crate::explain::Plan;
use crate::settings::PlannerSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default page size of a PostgreSQL heap page
pub const DEFAULT_PAGE_SIZE_BYTES: u64 = 8192;

/// Table-level lock mode a statement is expected to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockLevel {
    AccessShare,
    RowShare,
    RowExclusive,
    /// Never inferred from statement text; DDL callers may report it
    AccessExclusive,
}

impl LockLevel {
    /// Returns the lock mode as PostgreSQL spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessShare => "ACCESS SHARE",
            Self::RowShare => "ROW SHARE",
            Self::RowExclusive => "ROW EXCLUSIVE",
            Self::AccessExclusive => "ACCESS EXCLUSIVE",
        }
    }
}

impl fmt::Display for LockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers the lock level from the statement's leading keyword
pub fn infer_lock_level(sql: &str) -> LockLevel {
    let s = sql.trim_start().to_lowercase();
    if s.starts_with("update") || s.starts_with("delete") || s.starts_with("insert") {
        LockLevel::RowExclusive
    } else if s.starts_with("select") && s.contains("for update") {
        LockLevel::RowShare
    } else {
        LockLevel::AccessShare
    }
}

/// Linear conversion from planner cost units to milliseconds
///
/// `time_ms = slope_a * total_cost + intercept_b`, floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub slope_a: f64,
    pub intercept_b: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            slope_a: 1.0,
            intercept_b: 0.0,
        }
    }
}

impl CostModel {
    pub fn new(slope_a: f64, intercept_b: f64) -> Self {
        Self {
            slope_a,
            intercept_b,
        }
    }

    /// Converts a total plan cost to whole milliseconds
    pub fn to_millis(&self, total_cost: f64) -> u64 {
        (self.slope_a * total_cost + self.intercept_b).max(0.0) as u64
    }
}

/// Resource footprint predicted for a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightEstimates {
    pub expected_time_ms: u64,
    /// Bytes produced by scan nodes
    pub scanned_bytes: u64,
    pub estimated_pages_read: u64,
    /// Summed sort and hash memory demand
    pub memory_peak_bytes: u64,
    /// True when the plan contains a Gather node
    pub parallel_planned: bool,
    pub lock_level: LockLevel,
}

/// Computes [`PreflightEstimates`] from a parsed plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreflightEstimator {
    page_size_bytes: u64,
    cost_model: CostModel,
}

impl Default for PreflightEstimator {
    fn default() -> Self {
        Self {
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
            cost_model: CostModel::default(),
        }
    }
}

impl PreflightEstimator {
    pub fn new(page_size_bytes: u64, cost_model: CostModel) -> Self {
        Self {
            page_size_bytes: page_size_bytes.max(1),
            cost_model,
        }
    }

    pub fn page_size_bytes(&self) -> u64 {
        self.page_size_bytes
    }

    pub fn cost_model(&self) -> CostModel {
        self.cost_model
    }

    /// Estimates the footprint of `sql` executed with `plan`
    ///
    /// `_settings` is accepted so the estimator and the rules share one
    /// calling convention.
    pub fn estimate(&self, plan: &Plan, _settings: &PlannerSettings, sql: &str) -> PreflightEstimates {
        let mut scanned_bytes: u64 = 0;
        let mut memory_peak_bytes: u64 = 0;
        let mut parallel_planned = false;

        for node in plan.iter_nodes() {
            let kind = node.kind();
            let bytes = node_bytes(node);

            if kind.contains("scan") {
                scanned_bytes = scanned_bytes.saturating_add(bytes);
            }

            if kind == "sort" {
                memory_peak_bytes = memory_peak_bytes.saturating_add(bytes.saturating_mul(2));
            } else if kind.contains("hash") {
                memory_peak_bytes = memory_peak_bytes.saturating_add((bytes as f64 * 1.5) as u64);
            }

            if kind.contains("gather") {
                parallel_planned = true;
            }
        }

        PreflightEstimates {
            expected_time_ms: self.cost_model.to_millis(plan.total_cost),
            scanned_bytes,
            estimated_pages_read: scanned_bytes / self.page_size_bytes,
            memory_peak_bytes,
            parallel_planned,
            lock_level: infer_lock_level(sql),
        }
    }
}

/// Estimated bytes produced by a node: rows times width, with width at least 1
pub fn node_bytes(node: &crate::explain::PlanNode) -> u64 {
    let rows = node.estimated_rows.max(0.0);
    let width = f64::from(node.plan_width.max(1));
    (rows * width) as u64
}

#[cfg(test)]
mod tests;
