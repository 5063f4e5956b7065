//! Gate configuration: annotation prefix and re-evaluation delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AnnotationKeys, DEFAULT_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("annotation prefix must not be empty")]
    EmptyPrefix,

    #[error("annotation prefix {0:?} must not end with '/'")]
    TrailingSlash(String),

    #[error("retry delay must be at least one second")]
    ZeroRetryDelay,
}

/// Settings for one rate-limit gate.
///
/// Missing fields fall back to [`GateConfig::default_v1`] when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Prefix of the `limit`, `query` and `admitted-at` annotation keys.
    pub annotation_prefix: String,

    /// Delay returned with every verdict, in seconds.
    pub retry_delay_secs: u64,
}

impl GateConfig {
    /// `slotgate/*` annotations, re-evaluate every 15s.
    pub fn default_v1() -> Self {
        Self {
            annotation_prefix: DEFAULT_PREFIX.to_string(),
            retry_delay_secs: 15,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn annotation_keys(&self) -> AnnotationKeys {
        AnnotationKeys::with_prefix(&self.annotation_prefix)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.annotation_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.annotation_prefix.ends_with('/') {
            return Err(ConfigError::TrailingSlash(self.annotation_prefix.clone()));
        }
        if self.retry_delay_secs == 0 {
            return Err(ConfigError::ZeroRetryDelay);
        }
        Ok(())
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::default_v1()
    }
}
