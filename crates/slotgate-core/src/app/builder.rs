//! HostBuilder - permit plugin の登録とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 名前によるディスパッチ（ホストが plugin 名で permit を呼ぶ）

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::registry::{PluginRegistry, RegistryError};
use crate::domain::{PermitDecision, Task};
use crate::ports::PermitPlugin;

/// HostBuilder はホスト側の plugin 表を構築
///
/// # 使用例
/// ```ignore
/// let host = HostBuilder::new()
///     .register(Arc::new(rate_limit))?
///     .expect_plugins(&["RateLimit"])
///     .build()?;
/// let decision = host.permit("RateLimit", &cancel, &mut task, "slot-1").await?;
/// ```
///
/// # Fail-fast 設計
/// - expect_plugins() で期待される plugin 名を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
pub struct HostBuilder {
    registry: PluginRegistry,
    expected_plugins: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing plugins: {0:?}. These plugins were expected but not registered.")]
    MissingPlugins(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("no permit plugin registered under '{0}'")]
    PluginNotFound(String),
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            registry: PluginRegistry::new(),
            expected_plugins: None,
        }
    }

    pub fn register(mut self, plugin: Arc<dyn PermitPlugin>) -> Result<Self, RegistryError> {
        self.registry.register(plugin)?;
        Ok(self)
    }

    pub fn expect_plugins(mut self, names: &[&str]) -> Self {
        self.expected_plugins = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Host, BuildError> {
        if let Some(expected) = &self.expected_plugins {
            let registered = self.registry.registered_names();
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !registered.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingPlugins(missing));
            }
        }
        Ok(Host {
            registry: self.registry,
        })
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Host dispatches permit calls to registered plugins by name.
pub struct Host {
    registry: PluginRegistry,
}

impl Host {
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub async fn permit(
        &self,
        plugin: &str,
        cancel: &CancellationToken,
        task: &mut Task,
        target_slot: &str,
    ) -> Result<PermitDecision, HostError> {
        let plugin = self
            .registry
            .get(plugin)
            .ok_or_else(|| HostError::PluginNotFound(plugin.to_string()))?;
        Ok(plugin.permit(cancel, task, target_slot).await)
    }
}
