//! Decision model: what the gate tells the host scheduler.
//!
//! Every evaluation ends in exactly one [`Verdict`], paired with the delay after
//! which the host should invoke the gate again for the same task.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::GateError;

/// Verdict returned to the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// The task may occupy the slot. It has been marked as admitted.
    Admit,

    /// The limit would be exceeded. Nothing was written.
    Wait,

    /// The task could not be evaluated (malformed task, store failure, cancellation).
    Error,
}

/// The full answer of one `permit` call.
///
/// `retry_after` is advisory on `Admit`; the host uses it for bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDecision {
    pub verdict: Verdict,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(with = "duration_secs")]
    pub retry_after: Duration,
}

impl PermitDecision {
    pub fn admit(retry_after: Duration) -> Self {
        Self {
            verdict: Verdict::Admit,
            message: String::new(),
            retry_after,
        }
    }

    pub fn wait(message: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            verdict: Verdict::Wait,
            message: message.into(),
            retry_after,
        }
    }

    /// Error verdict carrying the error's display text verbatim.
    pub fn error(err: &GateError, retry_after: Duration) -> Self {
        Self {
            verdict: Verdict::Error,
            message: err.to_string(),
            retry_after,
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.verdict == Verdict::Admit
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
