//! Planner settings consulted by the estimator and the rules

use serde::{Deserialize, Serialize};

/// Planner cost parameters and memory budget
///
/// These mirror the server's `random_page_cost`, `seq_page_cost` and
/// `work_mem` settings. They are supplied by the caller and never read from
/// the database.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub random_page_cost: f64,
    pub seq_page_cost: f64,
    /// Per-operation memory budget in MiB
    pub work_mem_mb: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            random_page_cost: 4.0,
            seq_page_cost: 1.0,
            work_mem_mb: 64,
        }
    }
}

impl PlannerSettings {
    /// Sets the work_mem budget in MiB
    pub fn with_work_mem_mb(mut self, mb: u32) -> Self {
        self.work_mem_mb = mb;
        self
    }

    /// work_mem expressed in bytes
    pub fn work_mem_bytes(&self) -> u64 {
        u64::from(self.work_mem_mb) * 1024 * 1024
    }
}
