use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use slotgate_core::GateConfig;
use std::path::Path;
use tracing::debug;

use crate::cli::CliArgs;

/// CLI configuration loaded from TOML file.
///
/// ```toml
/// [gate]
/// annotation_prefix = "slotgate"
/// retry_delay_secs = 15
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub gate: GateConfig,
}

impl CliConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Flags and environment variables win over the file.
    pub fn with_overrides(mut self, args: &CliArgs) -> Self {
        if let Some(prefix) = &args.annotation_prefix {
            self.gate.annotation_prefix = prefix.clone();
        }
        if let Some(secs) = args.retry_delay_secs {
            self.gate.retry_delay_secs = secs;
        }
        self
    }
}
