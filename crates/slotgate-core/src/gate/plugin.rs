//! RateLimit - the permit plugin that sequences the gate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{AdmissionMarker, AnnotationKeys, ConfigError, GateConfig, MarkOutcome, OccupancyCounter};
use crate::domain::{ErrorKind, GateError, PermitDecision, Task};
use crate::ports::{Clock, PermitPlugin, TaskStore};

/// Name the gate is registered under.
pub const NAME: &str = "RateLimit";

/// Result of an evaluation that got as far as a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Evaluation {
    Admitted { count: usize, outcome: MarkOutcome },
    Limited { query: String, count: usize },
}

/// Rate-limit gate.
///
/// Holds no mutable state: every evaluation reads the store, decides, and
/// writes at most one patch. Two candidates evaluated at the same time can
/// both see room and both be admitted, so the limit is a soft ceiling.
pub struct RateLimit {
    keys: AnnotationKeys,
    counter: OccupancyCounter,
    marker: AdmissionMarker,
    retry_delay: Duration,
}

impl RateLimit {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        config: &GateConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let keys = config.annotation_keys();
        Ok(Self {
            counter: OccupancyCounter::new(store.clone(), keys.clone()),
            marker: AdmissionMarker::new(store, clock, keys.clone()),
            keys,
            retry_delay: config.retry_delay(),
        })
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Read, count, compare, mark. Short-circuits on the first failure.
    ///
    /// The count check comes strictly before marking, so a task that would
    /// exceed the limit is never tagged and stays out of future counts.
    async fn evaluate(
        &self,
        cancel: &CancellationToken,
        task: &mut Task,
    ) -> Result<Evaluation, GateError> {
        let spec = self.keys.read(task)?;
        let occupants = self.counter.occupants(cancel, &spec.query).await?;

        // the candidate may already be among the occupants on a re-evaluation
        let candidate = task.key();
        let count = occupants.iter().filter(|t| t.key() != candidate).count() + 1;

        if count as u64 > spec.limit {
            return Ok(Evaluation::Limited {
                query: spec.query,
                count,
            });
        }

        // a stale copy of a task the store already admitted keeps the stored stamp
        let stored_stamp = occupants
            .iter()
            .find(|t| t.key() == candidate)
            .and_then(|t| t.annotation(self.keys.admitted_at()));
        if let (Some(stamp), false) = (stored_stamp, self.keys.is_admitted(task)) {
            task.metadata
                .annotations
                .insert(self.keys.admitted_at().to_string(), stamp.to_string());
            return Ok(Evaluation::Admitted {
                count,
                outcome: MarkOutcome::AlreadyAdmitted,
            });
        }

        let outcome = self.marker.mark(cancel, task).await?;
        Ok(Evaluation::Admitted { count, outcome })
    }
}

#[async_trait]
impl PermitPlugin for RateLimit {
    fn name(&self) -> &str {
        NAME
    }

    async fn permit(
        &self,
        cancel: &CancellationToken,
        task: &mut Task,
        target_slot: &str,
    ) -> PermitDecision {
        let span = info_span!("permit", task = %task.key(), slot = target_slot);
        let evaluation = self.evaluate(cancel, task).instrument(span.clone()).await;

        span.in_scope(|| match evaluation {
            Ok(Evaluation::Admitted { count, outcome }) => {
                info!(count, ?outcome, "admitted");
                PermitDecision::admit(self.retry_delay)
            }
            Ok(Evaluation::Limited { query, count }) => {
                debug!(%query, count, "rate limited");
                PermitDecision::wait(
                    format!("rate limiting has been triggered, query {query} returns {count} running tasks"),
                    self.retry_delay,
                )
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::Permanent => warn!(error = %err, "cannot evaluate task"),
                    ErrorKind::Infrastructure => error!(error = %err, "task store failed"),
                    ErrorKind::Transient => info!(error = %err, "evaluation interrupted"),
                }
                PermitDecision::error(&err, self.retry_delay)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoreError, TaskKey, TaskPhase, Verdict};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;

    const LIMIT: &str = "slotgate/limit";
    const QUERY: &str = "slotgate/query";
    const ADMITTED: &str = "slotgate/admitted-at";
    const STAMP: &str = "2024-01-01T12:00:00+00:00";

    fn gate(store: Arc<InMemoryTaskStore>) -> RateLimit {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        RateLimit::new(store, Arc::new(FixedClock::new(at)), &GateConfig::default()).unwrap()
    }

    fn candidate(limit: &str) -> Task {
        Task::new("batch", "candidate")
            .with_label("app", "import")
            .with_annotation(LIMIT, limit)
            .with_annotation(QUERY, "app=import")
    }

    fn peer(name: &str, phase: TaskPhase, admitted: bool) -> Task {
        let task = Task::new("batch", name)
            .with_label("app", "import")
            .with_phase(phase);
        if admitted {
            task.with_annotation(ADMITTED, "2024-01-01T00:00:00+00:00")
        } else {
            task
        }
    }

    fn admitted_peers(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| peer(&format!("peer-{i}"), TaskPhase::Running, true))
            .collect()
    }

    fn store_with(mut tasks: Vec<Task>, candidate: &Task) -> Arc<InMemoryTaskStore> {
        tasks.push(candidate.clone());
        Arc::new(InMemoryTaskStore::with_tasks(tasks))
    }

    async fn permit(gate: &RateLimit, task: &mut Task) -> PermitDecision {
        gate.permit(&CancellationToken::new(), task, "slot-1").await
    }

    #[test]
    fn registers_under_stable_name() {
        let gate = gate(Arc::new(InMemoryTaskStore::new()));
        assert_eq!(gate.name(), "RateLimit");
        assert_eq!(gate.retry_delay(), Duration::from_secs(15));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = GateConfig {
            retry_delay_secs: 0,
            ..GateConfig::default()
        };
        let result = RateLimit::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(crate::ports::SystemClock),
            &config,
        );
        assert!(matches!(result, Err(ConfigError::ZeroRetryDelay)));
    }

    #[tokio::test]
    async fn admits_when_count_reaches_limit() {
        let mut task = candidate("3");
        let store = store_with(admitted_peers(2), &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision, PermitDecision::admit(Duration::from_secs(15)));
        assert_eq!(task.annotation(ADMITTED), Some(STAMP));
        assert_eq!(store.patch_calls(), 1);
        assert_eq!(
            store.patches().await,
            vec![(
                TaskKey::new("batch", "candidate"),
                json!({"metadata": {"annotations": {ADMITTED: STAMP}}})
            )]
        );
        let stored = store.get(&task.key()).await.unwrap();
        assert_eq!(stored.annotation(ADMITTED), Some(STAMP));
    }

    #[tokio::test]
    async fn waits_when_limit_would_be_exceeded() {
        let mut task = candidate("3");
        let store = store_with(admitted_peers(3), &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Wait);
        assert_eq!(
            decision.message,
            "rate limiting has been triggered, query app=import returns 4 running tasks"
        );
        assert_eq!(decision.retry_after, Duration::from_secs(15));
        assert_eq!(store.patch_calls(), 0);
        assert_eq!(task.annotation(ADMITTED), None);
        let stored = store.get(&task.key()).await.unwrap();
        assert_eq!(stored.annotation(ADMITTED), None);
    }

    #[tokio::test]
    async fn list_failure_is_an_error_with_verbatim_message() {
        let mut task = candidate("3");
        let store = store_with(vec![], &task);
        let down = StoreError::Unavailable("dial tcp 10.0.0.1:443: connection refused".into());
        store.fail_list_with(Some(down.clone())).await;
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert_eq!(decision.message, down.to_string());
        assert_eq!(store.patch_calls(), 0);
    }

    #[tokio::test]
    async fn non_numeric_limit_touches_nothing() {
        let mut task = candidate("abc");
        let store = store_with(vec![], &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert!(decision.message.contains("invalid annotation slotgate/limit"));
        assert_eq!(store.list_calls(), 0);
        assert_eq!(store.patch_calls(), 0);
    }

    #[rstest]
    #[case(LIMIT)]
    #[case(QUERY)]
    #[tokio::test]
    async fn missing_annotation_is_an_error(#[case] dropped: &str) {
        let mut task = candidate("3");
        task.metadata.annotations.remove(dropped);
        let store = store_with(vec![], &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert_eq!(decision.message, format!("annotation not found: {dropped}"));
        assert_eq!(store.list_calls(), 0);
        assert_eq!(store.patch_calls(), 0);
    }

    #[tokio::test]
    async fn repeated_permit_marks_only_once() {
        let mut task = candidate("3");
        let store = store_with(admitted_peers(2), &task);
        let gate = gate(store.clone());

        let first = permit(&gate, &mut task).await;
        let second = permit(&gate, &mut task).await;

        assert_eq!(first.verdict, Verdict::Admit);
        assert_eq!(second.verdict, Verdict::Admit);
        assert_eq!(store.patch_calls(), 1);
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn stale_copy_keeps_the_stored_stamp() {
        let stale = candidate("3");
        let stored = stale.clone().with_annotation(ADMITTED, "2023-12-31T08:00:00+00:00");
        let store = Arc::new(InMemoryTaskStore::with_tasks(vec![stored]));
        let gate = gate(store.clone());

        let mut task = stale;
        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Admit);
        assert_eq!(store.patch_calls(), 0);
        assert_eq!(task.annotation(ADMITTED), Some("2023-12-31T08:00:00+00:00"));
        let stored = store.get(&task.key()).await.unwrap();
        assert_eq!(stored.annotation(ADMITTED), Some("2023-12-31T08:00:00+00:00"));
    }

    #[tokio::test]
    async fn limit_beyond_32_bits_admits() {
        let mut task = candidate("5000000000");
        let store = store_with(admitted_peers(2), &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Admit);
        assert_eq!(store.patch_calls(), 1);
    }

    #[tokio::test]
    async fn stored_admitted_task_is_not_counted_twice() {
        let mut task = candidate("3");
        let store = store_with(admitted_peers(2), &task);
        let gate = gate(store.clone());
        assert!(permit(&gate, &mut task).await.is_admitted());

        // the host retries with a fresh copy from the store
        let mut fresh = store.get(&task.key()).await.unwrap();
        let decision = permit(&gate, &mut fresh).await;

        assert_eq!(decision.verdict, Verdict::Admit);
        assert_eq!(store.patch_calls(), 1);
        assert_eq!(fresh.annotation(ADMITTED), Some(STAMP));
    }

    #[tokio::test]
    async fn ignores_finished_and_untagged_peers() {
        let mut task = candidate("1");
        let peers = vec![
            peer("done", TaskPhase::Succeeded, true),
            peer("failed", TaskPhase::Failed, true),
            peer("lost", TaskPhase::Unknown, true),
            peer("untagged-running", TaskPhase::Running, false),
            peer("untagged-pending", TaskPhase::Pending, false),
        ];
        let store = store_with(peers, &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Admit);
        assert_eq!(store.patch_calls(), 1);
    }

    #[tokio::test]
    async fn pending_but_admitted_peer_holds_a_slot() {
        let mut task = candidate("1");
        let store = store_with(vec![peer("queued", TaskPhase::Pending, true)], &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Wait);
        assert!(decision.message.ends_with("returns 2 running tasks"));
    }

    #[tokio::test]
    async fn peers_outside_the_query_do_not_count() {
        let mut task = candidate("1");
        let other = Task::new("batch", "other")
            .with_label("app", "report")
            .with_phase(TaskPhase::Running)
            .with_annotation(ADMITTED, "t");
        let store = store_with(vec![other], &task);
        let gate = gate(store.clone());

        assert_eq!(permit(&gate, &mut task).await.verdict, Verdict::Admit);
    }

    #[tokio::test]
    async fn zero_limit_always_waits() {
        let mut task = candidate("0");
        let store = store_with(vec![], &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Wait);
        assert!(decision.message.ends_with("returns 1 running tasks"));
        assert_eq!(store.patch_calls(), 0);
    }

    #[tokio::test]
    async fn lone_candidate_is_admitted_with_limit_one() {
        let mut task = candidate("1");
        let store = store_with(vec![], &task);
        let gate = gate(store.clone());

        assert_eq!(permit(&gate, &mut task).await.verdict, Verdict::Admit);
    }

    #[tokio::test]
    async fn patch_failure_is_an_error_and_leaves_task_unmarked() {
        let mut task = candidate("3");
        let store = store_with(vec![], &task);
        let conflict = StoreError::Conflict {
            key: task.key(),
            reason: "the object has been modified".into(),
        };
        store.fail_patch_with(Some(conflict.clone())).await;
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert_eq!(decision.message, conflict.to_string());
        assert_eq!(task.annotation(ADMITTED), None);
    }

    #[tokio::test]
    async fn malformed_query_is_an_error() {
        let mut task = candidate("3").with_annotation(QUERY, "app in (import");
        let store = store_with(vec![], &task);
        let gate = gate(store.clone());

        let decision = permit(&gate, &mut task).await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert!(decision.message.starts_with("invalid selector"));
        assert_eq!(store.patch_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_is_an_error() {
        let mut task = candidate("3");
        let store = store_with(vec![], &task);
        let gate = gate(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let decision = gate.permit(&cancel, &mut task, "slot-1").await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert_eq!(decision.message, "evaluation cancelled");
        assert_eq!(store.patch_calls(), 0);
        assert_eq!(task.annotation(ADMITTED), None);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_list() {
        let mut task = candidate("3");
        let store = Arc::new(
            InMemoryTaskStore::with_tasks([task.clone()]).with_list_latency(Duration::from_secs(30)),
        );
        let gate = gate(store.clone());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let decision = gate.permit(&cancel, &mut task, "slot-1").await;

        assert_eq!(decision.verdict, Verdict::Error);
        assert_eq!(decision.message, "evaluation cancelled");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(store.patch_calls(), 0);
    }

    #[tokio::test]
    async fn distinct_candidates_are_evaluated_independently() {
        let a = Task::new("batch", "a")
            .with_label("app", "import")
            .with_annotation(LIMIT, "2")
            .with_annotation(QUERY, "app=import");
        let b = Task::new("batch", "b")
            .with_label("app", "import")
            .with_annotation(LIMIT, "2")
            .with_annotation(QUERY, "app=import");
        let store = Arc::new(InMemoryTaskStore::with_tasks([a.clone(), b.clone()]));
        let gate = Arc::new(gate(store.clone()));

        let (mut a, mut b) = (a, b);
        let (da, db) = tokio::join!(permit(&gate, &mut a), permit(&gate, &mut b));

        assert!(da.is_admitted());
        assert!(db.is_admitted());
        assert_eq!(store.patch_calls(), 2);

        // both now hold slots: a third comparable task must wait
        let mut c = candidate("2");
        store.insert(c.clone()).await;
        assert_eq!(permit(&gate, &mut c).await.verdict, Verdict::Wait);
    }
}
