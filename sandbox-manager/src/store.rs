use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("project not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("store response decode: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Caller-scoped access token for stores that enforce row-level access
/// control. Absent credentials mean the store's own service identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// A project idle since before some cutoff that still references a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveProject {
    pub id: String,
    pub name: String,
    pub sandbox_id: String,
}

/// Durable per-project record. The stored `sandbox_id` is a hint: the
/// sandbox it names may have expired or never finished being created.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn read_sandbox_id(
        &self,
        project_id: &str,
        credentials: Option<&Credentials>,
    ) -> StoreResult<Option<String>>;

    /// Replace the stored sandbox id. When `activity` is set it also
    /// becomes the project's `last_activity`.
    async fn write_sandbox_id(
        &self,
        project_id: &str,
        sandbox_id: Option<&str>,
        activity: Option<DateTime<Utc>>,
        credentials: Option<&Credentials>,
    ) -> StoreResult<()>;

    async fn touch(
        &self,
        project_id: &str,
        at: DateTime<Utc>,
        credentials: Option<&Credentials>,
    ) -> StoreResult<()>;

    /// Projects with `last_activity < cutoff` and a non-null sandbox id.
    async fn list_inactive(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<InactiveProject>>;

    /// Current `last_activity` of a project, read with the store's own
    /// identity. `None` when the project has no record.
    async fn last_activity(&self, project_id: &str) -> StoreResult<Option<DateTime<Utc>>>;
}
