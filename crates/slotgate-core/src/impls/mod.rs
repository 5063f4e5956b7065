//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: テスト・CLI 用のタスクストア
//!
//! # 本番用実装
//! クラスタの API クライアントを包む TaskStore 実装は別クレートに置きます。

pub mod inmem_store;

pub use self::inmem_store::InMemoryTaskStore;
