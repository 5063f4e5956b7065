//! PermitPlugin port - ホストスケジューラから呼ばれる入口
//!
//! ホストは各スケジューリング試行で `permit` を呼び、返された verdict と
//! retry_after に従って再評価のタイミングを決めます。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{PermitDecision, Task};

/// PermitPlugin はスロット占有前の許可判定
///
/// # 契約
/// - 同じタスクに対して何度でも（並行にも）呼ばれうる
/// - `cancel` が発火したら直ちに `Verdict::Error` を返す
/// - `task` は呼び出し側のコピー。admit 時には admission の印が反映される
#[async_trait]
pub trait PermitPlugin: Send + Sync {
    /// Stable name the host registers and dispatches this plugin under.
    fn name(&self) -> &str;

    async fn permit(
        &self,
        cancel: &CancellationToken,
        task: &mut Task,
        target_slot: &str,
    ) -> PermitDecision;
}
