//! Logging setup for processes embedding the advisor
//!
//! `RUST_LOG` takes precedence over [`LoggingConfig::default_filter`].

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    pub include_location: bool,
    /// Log span open/close, mostly useful around `examine`
    pub enable_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_filter: "info,preflight_advisor=debug".to_string(),
            include_location: cfg!(debug_assertions),
            enable_spans: false,
        }
    }
}

impl LoggingConfig {
    /// JSON lines, warnings and above except for advisor crates
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: "warn,preflight_advisor=info,preflight_capture=info".to_string(),
            include_location: false,
            enable_spans: false,
        }
    }

    pub fn development() -> Self {
        Self {
            default_filter: "debug".to_string(),
            enable_spans: true,
            ..Self::default()
        }
    }

    /// The filter `init` installs
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .pretty()
            .with_filter(config.env_filter())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .json()
            .with_current_span(true)
            .with_filter(config.env_filter())
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    tracing::info!(format = ?config.format, "logging initialized");
    Ok(())
}
