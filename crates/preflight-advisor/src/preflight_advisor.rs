//! Preflight Advisor - EXPLAIN-based analysis of captured statements
//!
//! The advisor re-plans a captured [`BoundQuery`](preflight_core::BoundQuery)
//! with `EXPLAIN` on a dedicated connection pool, estimates its resource
//! footprint and runs the rule engine over the plan.
//!
//! # Example
//!
//! ```ignore
//! use preflight_advisor::{AdvisorConfig, PlanAdvisor};
//!
//! let config = AdvisorConfig::load("preflight.toml")?;
//! let advisor = PlanAdvisor::connect(&config).await?;
//! let result = advisor.examine(&query).await?;
//! for rec in &result.recommendations {
//!     println!("{} {}", rec.priority, rec.title);
//! }
//! ```

mod advisor;
pub mod binding;
mod config;
mod error;
pub mod logging;
mod options;
mod result;
mod worker;

pub use advisor::{Advisor, PlanAdvisor, PlanAdvisorBuilder};
pub use binding::{Binder, bind_param, select_binder};
pub use config::{AdvisorConfig, ConfigError};
pub use error::{AdvisorError, AdvisorResult};
pub use options::{ExplainOptions, ExplainPreset};
pub use result::AnalysisResult;
pub use worker::{AdvisorWorker, AnalysisReport, ReportHandler};
