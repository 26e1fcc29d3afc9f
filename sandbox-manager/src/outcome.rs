use std::fmt;
use std::sync::Arc;

use sandbox::Sandbox;
use serde::Serialize;

/// A best-effort step that did not complete. The operation as a whole still
/// finished, but the registry, store and backend may now disagree until the
/// next access reconciles them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftFailure {
    LivenessCheck(String),
    TimeoutRefresh(String),
    StoreRead(String),
    Resume { sandbox_id: String, reason: String },
    StoreWrite(String),
    Pause(String),
    Kill(String),
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LivenessCheck(reason) => write!(f, "liveness check: {reason}"),
            Self::TimeoutRefresh(reason) => write!(f, "timeout refresh: {reason}"),
            Self::StoreRead(reason) => write!(f, "store read: {reason}"),
            Self::Resume { sandbox_id, reason } => write!(f, "resume {sandbox_id}: {reason}"),
            Self::StoreWrite(reason) => write!(f, "store write: {reason}"),
            Self::Pause(reason) => write!(f, "pause: {reason}"),
            Self::Kill(reason) => write!(f, "kill: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    soft_failures: Vec<SoftFailure>,
}

impl Outcome {
    /// True when every step succeeded and all three sources of truth agree.
    pub fn is_clean(&self) -> bool {
        self.soft_failures.is_empty()
    }

    pub fn soft_failures(&self) -> &[SoftFailure] {
        &self.soft_failures
    }

    pub(crate) fn record(&mut self, failure: SoftFailure) {
        self.soft_failures.push(failure);
    }
}

/// Where an acquired handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireSource {
    Cached,
    Resumed,
    Created,
}

pub struct Acquired {
    pub handle: Arc<dyn Sandbox>,
    pub source: AcquireSource,
    pub outcome: Outcome,
}

impl fmt::Debug for Acquired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquired")
            .field("sandbox_id", &self.handle.id())
            .field("source", &self.source)
            .field("outcome", &self.outcome)
            .finish()
    }
}
