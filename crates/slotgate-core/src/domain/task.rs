use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{TaskKey, TaskPhase};

/// Object metadata: identity, labels and annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub phase: TaskPhase,
}

/// A unit of work as stored in the task store.
///
/// The serialized shape is what merge patches are computed against:
/// `{"metadata": {...}, "status": {"phase": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                namespace: namespace.into(),
                name: name.into(),
                labels: BTreeMap::new(),
                annotations: BTreeMap::new(),
            },
            status: TaskStatus::default(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_phase(mut self, phase: TaskPhase) -> Self {
        self.status.phase = phase;
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn phase(&self) -> TaskPhase {
        self.status.phase
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_in_store_shape() {
        let task = Task::new("batch", "import-1")
            .with_label("app", "import")
            .with_annotation("slotgate/limit", "2")
            .with_phase(TaskPhase::Running);

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            json!({
                "metadata": {
                    "namespace": "batch",
                    "name": "import-1",
                    "labels": {"app": "import"},
                    "annotations": {"slotgate/limit": "2"},
                },
                "status": {"phase": "Running"},
            })
        );
    }

    #[test]
    fn missing_status_means_pending() {
        let task: Task = serde_json::from_value(json!({
            "metadata": {"namespace": "batch", "name": "import-1"}
        }))
        .unwrap();
        assert_eq!(task.phase(), TaskPhase::Pending);
        assert!(task.labels().is_empty());
        assert_eq!(task.annotation("slotgate/limit"), None);
    }

    #[test]
    fn key_is_derived_from_metadata() {
        let task = Task::new("batch", "import-1");
        assert_eq!(task.key(), TaskKey::new("batch", "import-1"));
    }
}
