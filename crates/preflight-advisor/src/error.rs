//! Advisor error types

use preflight_analyzer::PlanParseError;
use preflight_core::PreflightError;
use thiserror::Error;

/// Errors raised while examining a query
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// EXPLAIN returned text that is not a plan
    #[error("failed to parse EXPLAIN output: {0}")]
    Parse(#[from] PlanParseError),

    /// EXPLAIN ran but produced no usable result
    #[error("EXPLAIN execution failed: {0}")]
    ExplainExecution(String),

    /// The first column of the EXPLAIN result is neither text nor JSON
    #[error("unreadable EXPLAIN output column of type {0}")]
    UnreadablePlan(&'static str),

    #[error(transparent)]
    Database(#[from] PreflightError),
}

pub type AdvisorResult<T> = std::result::Result<T, AdvisorError>;
