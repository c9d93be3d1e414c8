use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Target prefix shared by every acctrun crate and the `acctrun` binary.
const ACCTRUN_TARGET: &str = "acctrun";

/// Logging setup, usually read from the `logger` section of the run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// Either a bare level (`info`, `debug`, ...) or a full `EnvFilter` directive such as `acctrun_core=trace,warn`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl LoggerConfig {
    /// Override the level with a directive taken from the environment, if any.
    pub fn with_level_from(mut self, directive: Option<String>) -> Self {
        if let Some(level) = directive.filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        self
    }

    /// Filter directive actually installed.
    ///
    /// A bare level more verbose than `warn` applies to acctrun targets only; dependencies stay at `warn`
    /// so a `debug` run shows runner and credential detail without tokio or regex noise.
    /// Full directives are used as given.
    pub fn directive(&self) -> String {
        let level = self.level.trim();
        match level.parse::<LevelFilter>() {
            Ok(filter) if filter > LevelFilter::WARN => {
                format!("warn,{ACCTRUN_TARGET}={}", filter.to_string().to_lowercase())
            }
            _ => level.to_string(),
        }
    }

    pub(crate) fn env_filter(&self) -> Result<tracing_subscriber::EnvFilter, LoggerError> {
        let directive = self.directive();
        tracing_subscriber::EnvFilter::try_new(&directive).map_err(|e| LoggerError::InvalidDirective {
            reason: e.to_string(),
            directive,
        })
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || atty::is(atty::Stream::Stderr);
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}
