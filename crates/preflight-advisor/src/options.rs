//! EXPLAIN option sets

use serde::{Deserialize, Serialize};

/// Options rendered into the `EXPLAIN (...)` clause
///
/// `analyze` stays off in both presets: the advisor plans statements, it
/// never runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainOptions {
    pub format_json: bool,
    pub costs: bool,
    pub verbose: bool,
    pub settings: bool,
    pub summary: bool,
    pub buffers: bool,
    pub timing: bool,
    pub wal: bool,
    pub analyze: bool,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            format_json: true,
            costs: true,
            verbose: true,
            settings: true,
            summary: true,
            buffers: false,
            timing: false,
            wal: false,
            analyze: false,
        }
    }
}

impl ExplainOptions {
    /// Verbose plans with settings and summary, for interactive advice
    pub fn advisor() -> Self {
        Self::default()
    }

    /// Lean plans for CI gates: no verbose output, no summary
    pub fn ci() -> Self {
        Self {
            verbose: false,
            summary: false,
            ..Self::default()
        }
    }

    /// Renders the `EXPLAIN (...)` prefix, every option spelled out
    pub fn to_clause(&self) -> String {
        let format = if self.format_json { "JSON" } else { "TEXT" };
        format!(
            "EXPLAIN (FORMAT {}, COSTS {}, VERBOSE {}, SETTINGS {}, SUMMARY {}, BUFFERS {}, TIMING {}, WAL {}, ANALYZE {})",
            format,
            self.costs,
            self.verbose,
            self.settings,
            self.summary,
            self.buffers,
            self.timing,
            self.wal,
            self.analyze
        )
    }

    /// Prefixes `sql` with the rendered clause
    pub fn wrap(&self, sql: &str) -> String {
        format!("{} {}", self.to_clause(), sql)
    }
}

/// Named option preset, as spelled in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainPreset {
    #[default]
    Advisor,
    Ci,
}

impl ExplainPreset {
    pub fn options(&self) -> ExplainOptions {
        match self {
            Self::Advisor => ExplainOptions::advisor(),
            Self::Ci => ExplainOptions::ci(),
        }
    }
}

impl From<ExplainPreset> for ExplainOptions {
    fn from(preset: ExplainPreset) -> Self {
        preset.options()
    }
}
