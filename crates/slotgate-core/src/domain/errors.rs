//! Errors - エラー型と分類
//!
//! - `StoreError`: ストア（list / patch）のエラー。ゲートは解釈せずそのまま返す
//! - `GateError`: 1 回の評価で起きうる全エラー
//! - `ErrorKind`: 運用上の分類（ログレベルの判断に使う）

use std::num::ParseIntError;

use thiserror::Error;

use super::{SelectorError, TaskKey};

/// ErrorKind は評価エラーの分類
///
/// - Transient: 一時的なエラー（次の再評価で解消しうる）
/// - Permanent: 恒久的なエラー（タスク定義の修正が必要）
/// - Infrastructure: インフラエラー（ストアの障害）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Errors reported by a [`TaskStore`](crate::ports::TaskStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid selector {selector:?}: {source}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: SelectorError,
    },

    #[error("task not found: {0}")]
    NotFound(TaskKey),

    #[error("conflict updating {key}: {reason}")]
    Conflict { key: TaskKey, reason: String },

    #[error("invalid patch for {key}: {reason}")]
    InvalidPatch { key: TaskKey, reason: String },
}

/// Everything that can make a single gate evaluation fail.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("annotation not found: {0}")]
    MissingAnnotation(String),

    #[error("invalid annotation {key}: {value:?} is not a non-negative integer")]
    InvalidAnnotation {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("encoding task {key}: {source}")]
    Encoding {
        key: TaskKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("evaluation cancelled")]
    Cancelled,
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::MissingAnnotation(_)
            | GateError::InvalidAnnotation { .. }
            | GateError::Encoding { .. } => ErrorKind::Permanent,
            GateError::Store(StoreError::Unavailable(_)) => ErrorKind::Infrastructure,
            GateError::Store(_) | GateError::Cancelled => ErrorKind::Transient,
        }
    }
}
