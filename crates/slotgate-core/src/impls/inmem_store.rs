//! InMemoryTaskStore - テスト・CLI 用のタスクストア
//!
//! # 学習ポイント
//! - tokio::sync::Mutex による状態の排他制御
//! - merge patch をサーバ側で適用する流れ（serialize → apply → deserialize）
//! - 障害注入（list / patch の失敗、list の遅延）によるエラー経路のテスト

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::{Selector, StoreError, Task, TaskKey, apply_merge_patch};
use crate::ports::TaskStore;

#[derive(Default)]
struct StoreState {
    tasks: BTreeMap<TaskKey, Task>,
    /// Every patch applied so far, in order.
    patches: Vec<(TaskKey, Value)>,
    fail_list: Option<StoreError>,
    fail_patch: Option<StoreError>,
}

/// InMemoryTaskStore はプロセス内のタスクストア
///
/// # 実装詳細
/// - BTreeMap<TaskKey, Task> でキー順に保持（list の順序が安定する）
/// - list はラベルセレクタでフィルタ（不正なセレクタは InvalidSelector）
/// - patch は RFC 7386 merge patch として適用
/// - list / patch の呼び出し回数を記録（テストでの検証用）
///
/// # 使用例
/// ```ignore
/// let store = InMemoryTaskStore::with_tasks([Task::new("ns", "a")]);
/// let tasks = store.list("app=web").await?;
/// ```
#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    list_latency: Option<Duration>,
    list_calls: AtomicUsize,
    patch_calls: AtomicUsize,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store. A later task with the same key replaces an earlier one.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks = tasks.into_iter().map(|t| (t.key(), t)).collect();
        Self {
            state: Mutex::new(StoreState {
                tasks,
                ..StoreState::default()
            }),
            ..Self::default()
        }
    }

    /// Delay every `list` call, to leave room for cancellation.
    pub fn with_list_latency(mut self, latency: Duration) -> Self {
        self.list_latency = Some(latency);
        self
    }

    pub async fn insert(&self, task: Task) {
        self.state.lock().await.tasks.insert(task.key(), task);
    }

    pub async fn get(&self, key: &TaskKey) -> Option<Task> {
        self.state.lock().await.tasks.get(key).cloned()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.values().cloned().collect()
    }

    /// Make every subsequent `list` fail with `err` (`None` restores normal behaviour).
    pub async fn fail_list_with(&self, err: Option<StoreError>) {
        self.state.lock().await.fail_list = err;
    }

    /// Make every subsequent `patch` fail with `err` (`None` restores normal behaviour).
    pub async fn fail_patch_with(&self, err: Option<StoreError>) {
        self.state.lock().await.fail_patch = err;
    }

    pub async fn patches(&self) -> Vec<(TaskKey, Value)> {
        self.state.lock().await.patches.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list(&self, selector: &str) -> Result<Vec<Task>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.list_latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.lock().await;
        if let Some(err) = &state.fail_list {
            return Err(err.clone());
        }
        let parsed: Selector =
            selector.parse().map_err(|source| StoreError::InvalidSelector {
                selector: selector.to_string(),
                source,
            })?;

        Ok(state
            .tasks
            .values()
            .filter(|t| parsed.matches(t.labels()))
            .cloned()
            .collect())
    }

    /// merge patch を適用
    ///
    /// # 実装
    /// 1. patch を JSON としてパース
    /// 2. 対象タスクを JSON に変換して patch を適用
    /// 3. Task に戻す（形が壊れたら InvalidPatch）
    /// 4. キーが変わる patch は拒否
    async fn patch(&self, key: &TaskKey, merge_patch: &[u8]) -> Result<(), StoreError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if let Some(err) = &state.fail_patch {
            return Err(err.clone());
        }

        let invalid = |reason: String| StoreError::InvalidPatch {
            key: key.clone(),
            reason,
        };
        let patch: Value = serde_json::from_slice(merge_patch).map_err(|e| invalid(e.to_string()))?;
        let current = state
            .tasks
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let mut doc = serde_json::to_value(current).map_err(|e| invalid(e.to_string()))?;
        apply_merge_patch(&mut doc, &patch);
        let updated: Task = serde_json::from_value(doc).map_err(|e| invalid(e.to_string()))?;
        if updated.key() != *key {
            return Err(invalid(format!("patch renames task to {}", updated.key())));
        }

        tracing::debug!(task = %key, patch = %patch, "applied merge patch");
        state.tasks.insert(key.clone(), updated);
        state.patches.push((key.clone(), patch));
        Ok(())
    }
}
