//! PluginRegistry - plugin 名から PermitPlugin への対応表
//!
//! # 設計
//! - 初期化時に登録（mutable）
//! - 実行時は参照のみ（immutable、ロック不要）

use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::PermitPlugin;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Plugin '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn PermitPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    /// Register `plugin` under its own name. Names must be unique.
    pub fn register(&mut self, plugin: Arc<dyn PermitPlugin>) -> Result<(), RegistryError> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PermitPlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
