//! Occupancy counter: which comparable tasks currently hold a slot.
//!
//! A matched task occupies a slot only if it can still run (Pending or
//! Running) *and* carries this gate's `admitted-at` annotation. Phase alone
//! is not enough: a task can be Pending while already committed to a slot
//! by an earlier admission, and phase transitions lag behind.
//!
//! Tasks that match the query but were never admitted by this gate are not
//! counted.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AnnotationKeys, cancellable};
use crate::domain::{GateError, Task};
use crate::ports::TaskStore;

pub struct OccupancyCounter {
    store: Arc<dyn TaskStore>,
    keys: AnnotationKeys,
}

impl OccupancyCounter {
    pub fn new(store: Arc<dyn TaskStore>, keys: AnnotationKeys) -> Self {
        Self { store, keys }
    }

    pub fn occupies_slot(&self, task: &Task) -> bool {
        task.phase().can_occupy_slot() && self.keys.is_admitted(task)
    }

    /// List tasks matching `query` and keep the ones occupying a slot, in
    /// store order. Store errors are returned unchanged.
    pub async fn occupants(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<Vec<Task>, GateError> {
        let matched = cancellable(cancel, self.store.list(query)).await?;
        let total = matched.len();
        let occupants: Vec<Task> = matched
            .into_iter()
            .filter(|t| self.occupies_slot(t))
            .collect();
        debug!(query, matched = total, occupying = occupants.len(), "counted occupants");
        Ok(occupants)
    }
}
