use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use acctrun_core::RunOptions;
use acctrun_creds::ProviderConfig;
use acctrun_observe::LoggerConfig;
use acctrun_select::{SelectionConfig, SourceConfig};

/// Environment variable that overrides `logger.level`.
pub const LOG_ENV: &str = "ACCTRUN_LOG";

pub const DEFAULT_CONFIG: &str = "acctrun.json";

/// Everything the demo needs, read from a single JSON document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub logger: LoggerConfig,
    pub source: SourceConfig,
    pub selection: SelectionConfig,
    pub credentials: ProviderConfig,
    pub run: RunOptions,
    /// Log only run-level events and per-account problems.
    pub summary_log: bool,
    /// Simulated latency of the demo command per account.
    pub work_ms: u64,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}
