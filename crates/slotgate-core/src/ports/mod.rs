//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//!
//! # 設計原則
//! - タスクストアが source of truth（正本）
//! - ゲート本体は read → decide → conditional write の純粋な手続き
//! - ホストとの境界は PermitPlugin trait のみ

pub mod clock;
pub mod permit;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::permit::PermitPlugin;
pub use self::task_store::TaskStore;
