//! Annotation reader: the gate's three well-known annotation keys.

use crate::domain::{GateError, Task};

/// Prefix used when none is configured: `slotgate/limit`, `slotgate/query`,
/// `slotgate/admitted-at`.
pub const DEFAULT_PREFIX: &str = "slotgate";

/// Limit and predicate read from a candidate task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSpec {
    /// Label selector picking the comparable tasks.
    pub query: String,
    /// Maximum number of comparable tasks in slots, candidate included.
    pub limit: u64,
}

/// The annotation keys the gate reads (`limit`, `query`) and owns (`admitted-at`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    limit: String,
    query: String,
    admitted_at: String,
}

impl AnnotationKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            limit: format!("{prefix}/limit"),
            query: format!("{prefix}/query"),
            admitted_at: format!("{prefix}/admitted-at"),
        }
    }

    pub fn limit(&self) -> &str {
        &self.limit
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn admitted_at(&self) -> &str {
        &self.admitted_at
    }

    /// Whether this gate has already admitted `task`.
    pub fn is_admitted(&self, task: &Task) -> bool {
        task.annotation(&self.admitted_at).is_some()
    }

    /// Read the limit and query of `task`.
    ///
    /// Checked in order: limit present, limit numeric, query present. Pure.
    pub fn read(&self, task: &Task) -> Result<RateLimitSpec, GateError> {
        let raw_limit = task
            .annotation(&self.limit)
            .ok_or_else(|| GateError::MissingAnnotation(self.limit.clone()))?;
        let limit = raw_limit
            .parse::<u64>()
            .map_err(|source| GateError::InvalidAnnotation {
                key: self.limit.clone(),
                value: raw_limit.to_string(),
                source,
            })?;
        let query = task
            .annotation(&self.query)
            .ok_or_else(|| GateError::MissingAnnotation(self.query.clone()))?;

        Ok(RateLimitSpec {
            query: query.to_string(),
            limit,
        })
    }
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}
