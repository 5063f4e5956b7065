//! Domain model (task, phase, selector, verdicts, errors).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod merge_patch;
pub mod selector;
pub mod state;
pub mod task;

pub use decision::{PermitDecision, Verdict};
pub use errors::{ErrorKind, GateError, StoreError};
pub use ids::{ParseTaskKeyError, TaskKey};
pub use merge_patch::{apply_merge_patch, create_merge_patch};
pub use selector::{Requirement, Selector, SelectorError};
pub use state::TaskPhase;
pub use task::{ObjectMeta, Task, TaskStatus};
