//! App - ホスト側のワイヤリング
//!
//! # 主要コンポーネント
//! - **PluginRegistry**: plugin 名 → PermitPlugin
//! - **HostBuilder / Host**: 起動時検証と名前によるディスパッチ

pub mod builder;
pub mod registry;

pub use self::builder::{BuildError, Host, HostBuilder, HostError};
pub use self::registry::{PluginRegistry, RegistryError};
