//! slotgate-core
//!
//! Rate-limit admission gate for a workload scheduler.
//!
//! Before a task may occupy a resource slot, the gate counts the comparable
//! tasks already holding slots and answers `Admit`, `Wait` or `Error` along
//! with a re-evaluation delay. All state lives in annotations on the tasks
//! themselves; the gate keeps nothing in process.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Task, TaskKey, TaskPhase, Selector, Verdict, errors, merge patch）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, PermitPlugin）
//! - **gate**: ゲート本体（annotations, occupancy, marker, RateLimit plugin, config）
//! - **app**: ホスト側（PluginRegistry, HostBuilder）
//! - **impls**: 実装（InMemoryTaskStore）

pub mod app;
pub mod domain;
pub mod gate;
pub mod impls;
pub mod ports;

pub use app::{Host, HostBuilder};
pub use domain::{GateError, PermitDecision, StoreError, Task, TaskKey, TaskPhase, Verdict};
pub use gate::{GateConfig, RateLimit};
pub use impls::InMemoryTaskStore;
pub use ports::{Clock, PermitPlugin, SystemClock, TaskStore};
