//! TaskStore port - タスクの正本（source of truth）
//!
//! ゲートはプロセス内に状態を持ちません。占有数も admission の印も
//! すべてストア上のタスク（annotation）から読み書きします。
//!
//! # 実装
//! - `InMemoryTaskStore`: テスト・CLI 用
//! - 本番ではクラスタの API クライアントがこの trait を実装する

use async_trait::async_trait;

use crate::domain::{StoreError, Task, TaskKey};

/// TaskStore は list と patch の 2 操作だけを提供
///
/// # 設計原則
/// - `list` はクラスタ全体（namespace をまたぐ）が対象
/// - `patch` は RFC 7386 merge patch を受け取り、差分のみを適用する
/// - 同一オブジェクトへの並行更新の整合性はストア側の責務
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List every task matching the label `selector`, in a stable order.
    async fn list(&self, selector: &str) -> Result<Vec<Task>, StoreError>;

    /// Apply a JSON merge patch to the task addressed by `key`.
    async fn patch(&self, key: &TaskKey, merge_patch: &[u8]) -> Result<(), StoreError>;
}
