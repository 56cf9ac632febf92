//! Outcome of examining one query

use preflight_analyzer::{Plan, PreflightEstimates, Priority, Recommendation};
use serde::{Deserialize, Serialize};

/// Plan, estimates and ranked recommendations for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub plan: Plan,
    pub plan_cost: f64,
    pub estimates: PreflightEstimates,
    /// Sorted by descending expected gain
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    /// Highest priority among the recommendations
    pub fn highest_priority(&self) -> Option<Priority> {
        self.recommendations.iter().map(|r| r.priority).max()
    }

    /// Recommendations at or above `priority`, in ranked order
    pub fn at_least(&self, priority: Priority) -> impl Iterator<Item = &Recommendation> {
        self.recommendations
            .iter()
            .filter(move |r| r.priority >= priority)
    }

    /// DDL suggestions in ranked order
    pub fn ddl(&self) -> impl Iterator<Item = &str> {
        self.recommendations.iter().filter_map(|r| r.ddl.as_deref())
    }
}
