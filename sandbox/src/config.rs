use std::collections::BTreeMap;
use std::time::Duration;

/// Idle deadline applied on create, resume and every cache hit (1 hour).
pub const DEFAULT_SANDBOX_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Parameters for a fresh sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    pub template_id: String,
    pub timeout: Duration,
    /// Free-form tags stored with the sandbox by the backend.
    pub metadata: BTreeMap<String, String>,
    /// Extra request headers forwarded to the backend (e.g. team auth).
    pub headers: BTreeMap<String, String>,
}

impl CreateOptions {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            timeout: DEFAULT_SANDBOX_TIMEOUT,
            metadata: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
