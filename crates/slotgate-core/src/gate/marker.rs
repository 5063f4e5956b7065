//! Admission marker: write `admitted-at` once, as a minimal merge patch.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AnnotationKeys, cancellable};
use crate::domain::{GateError, Task, create_merge_patch};
use crate::ports::{Clock, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The task already carried `admitted-at`; nothing was written.
    AlreadyAdmitted,
    /// `admitted-at` was written to the store.
    Marked,
}

pub struct AdmissionMarker {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    keys: AnnotationKeys,
}

impl AdmissionMarker {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, keys: AnnotationKeys) -> Self {
        Self { store, clock, keys }
    }

    /// Mark `task` as admitted.
    ///
    /// Snapshots the task before and after setting `admitted-at` and sends
    /// only the difference, so concurrent edits to other fields survive.
    /// `task` is updated only once the store has accepted the patch.
    pub async fn mark(
        &self,
        cancel: &CancellationToken,
        task: &mut Task,
    ) -> Result<MarkOutcome, GateError> {
        if self.keys.is_admitted(task) {
            return Ok(MarkOutcome::AlreadyAdmitted);
        }

        let key = task.key();
        let encoding = |source| GateError::Encoding {
            key: key.clone(),
            source,
        };

        let before = serde_json::to_value(&*task).map_err(encoding)?;
        let mut updated = task.clone();
        updated.metadata.annotations.insert(
            self.keys.admitted_at().to_string(),
            self.clock.now().to_rfc3339(),
        );
        let after = serde_json::to_value(&updated).map_err(encoding)?;
        let patch = serde_json::to_vec(&create_merge_patch(&before, &after)).map_err(encoding)?;

        cancellable(cancel, self.store.patch(&key, &patch)).await?;
        debug!(task = %key, "marked admitted");

        *task = updated;
        Ok(MarkOutcome::Marked)
    }
}
