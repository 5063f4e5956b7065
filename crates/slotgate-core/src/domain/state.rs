//! State - タスクのライフサイクル
//!
//! フェーズはストア側が管理し、ゲートは読むだけです。

use serde::{Deserialize, Serialize};

/// TaskPhase はタスクの外部ライフサイクル
///
/// # 状態
/// - pending: スロット待ち（ゲート通過済みでも pending のことがある）
/// - running: 実行中
/// - succeeded / failed: 終了
/// - unknown: 状態不明（ノード断など）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl TaskPhase {
    /// Whether a task in this phase can still hold a slot.
    ///
    /// Terminal (`Succeeded`, `Failed`) and indeterminate (`Unknown`) phases
    /// never contend for a slot.
    pub fn can_occupy_slot(self) -> bool {
        matches!(self, TaskPhase::Pending | TaskPhase::Running)
    }
}
