//! Task identifiers.
//!
//! タスクは `namespace/name` で一意に識別されます。
//! ストアへの patch もこのキーで宛先を指定します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace used when a key is written without one (`"name"` instead of `"ns/name"`).
pub const DEFAULT_NAMESPACE: &str = "default";

/// Unique key of a task inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    namespace: String,
    name: String,
}

impl TaskKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// TaskKey のパースエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task key {0:?}: expected \"namespace/name\" or \"name\"")]
pub struct ParseTaskKeyError(String);

impl FromStr for TaskKey {
    type Err = ParseTaskKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => (DEFAULT_NAMESPACE, s),
        };
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ParseTaskKeyError(s.to_string()));
        }
        Ok(Self::new(namespace, name))
    }
}
