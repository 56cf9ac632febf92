//! Advisor configuration file

use std::path::{Path, PathBuf};

use preflight_analyzer::{CostModel, PlannerSettings, PreflightEstimator, RuleEngine, RuleThresholds};
use preflight_connection::PoolConfig;
use preflight_driver_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::{ExplainOptions, ExplainPreset};

/// Errors raised while loading an [`AdvisorConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid advisor config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Everything needed to build a [`crate::PlanAdvisor`]
///
/// Every key is optional. `page_size_bytes` applies to both the estimator
/// and the page-based rule thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub explain_preset: ExplainPreset,
    pub page_size_bytes: u64,
    /// Evaluate rules on the rayon pool
    pub parallel_rules: bool,
    pub planner: PlannerSettings,
    pub cost_model: CostModel,
    /// Sizing of the dedicated EXPLAIN pool
    pub pool: PoolConfig,
    pub thresholds: RuleThresholds,
    /// Target database for [`crate::PlanAdvisor::connect`]
    pub database: Option<PostgresConfig>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            explain_preset: ExplainPreset::default(),
            page_size_bytes: preflight_analyzer::preflight::DEFAULT_PAGE_SIZE_BYTES,
            parallel_rules: false,
            planner: PlannerSettings::default(),
            cost_model: CostModel::default(),
            pool: PoolConfig::default(),
            thresholds: RuleThresholds::default(),
            database: None,
        }
    }
}

impl AdvisorConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "advisor config loaded");
        Ok(config)
    }

    pub fn explain_options(&self) -> ExplainOptions {
        self.explain_preset.options()
    }

    pub fn estimator(&self) -> PreflightEstimator {
        PreflightEstimator::new(self.page_size_bytes, self.cost_model)
    }

    /// Thresholds with the configured page size applied
    pub fn effective_thresholds(&self) -> RuleThresholds {
        RuleThresholds {
            page_size_bytes: self.page_size_bytes,
            ..self.thresholds.clone()
        }
    }

    /// The standard rule set built from the configured thresholds
    pub fn rule_engine(&self) -> RuleEngine {
        self.effective_thresholds().rule_engine()
    }
}

#[cfg(test)]
mod tests;
