//! Log output settings.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
pub const LOG_ENV: &str = "VITALWATCH_LOG";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// Event filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from settings, the environment and `--verbose`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the chosen filter directive does not parse.
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Result<Self> {
        let directive = filter_directive(settings, verbose, |key| std::env::var(key).ok());
        let filter = EnvFilter::try_new(&directive)
            .map_err(|e| Error::InvalidInput(format!("invalid log filter '{directive}': {e}")))?;
        Ok(Self {
            format: settings.format,
            file: settings.file.clone(),
            filter,
        })
    }
}

/// Picks the filter directive.
///
/// Precedence: `VITALWATCH_LOG`, `RUST_LOG`, `--verbose`, the configured level,
/// then `info`.
pub fn filter_directive(
    settings: &LoggingSettings,
    verbose: bool,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let env = |key: &str| lookup(key).filter(|value: &String| !value.trim().is_empty());
    env(LOG_ENV)
        .or_else(|| env("RUST_LOG"))
        .or_else(|| verbose.then(|| "debug".to_string()))
        .or_else(|| settings.level.clone())
        .unwrap_or_else(|| "info".to_string())
}
