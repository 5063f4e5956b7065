//! Gate - rate-limit admission gate
//!
//! 評価の流れ（1 回の permit 呼び出し）:
//! 1. annotations: limit / query を読む
//! 2. occupancy: query に一致し、スロットを占有中のタスクを数える
//! 3. 比較: 占有数 + 1（候補自身）が limit を超えたら Wait
//! 4. marker: admitted-at を merge patch で書き込む（1 回だけ）
//!
//! リトライはしません。再評価はホストが retry_after 後に行います。

pub mod annotations;
pub mod config;
pub mod marker;
pub mod occupancy;
pub mod plugin;

pub use self::annotations::{AnnotationKeys, DEFAULT_PREFIX, RateLimitSpec};
pub use self::config::{ConfigError, GateConfig};
pub use self::marker::{AdmissionMarker, MarkOutcome};
pub use self::occupancy::OccupancyCounter;
pub use self::plugin::{NAME, RateLimit};

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::domain::{GateError, StoreError};

/// Race a store call against cancellation. An already-cancelled token wins
/// without polling the store call at all.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, GateError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GateError::Cancelled),
        result = call => result.map_err(GateError::from),
    }
}
