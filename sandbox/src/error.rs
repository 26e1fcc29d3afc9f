#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox not found: {0}")]
    NotFound(String),

    #[error("sandbox creation failed: {0}")]
    CreationFailed(String),

    #[error("sandbox resume failed: {0}")]
    ResumeFailed(String),

    #[error("sandbox pause failed: {0}")]
    PauseFailed(String),

    #[error("sandbox kill failed: {0}")]
    KillFailed(String),

    #[error("execution failed: {0}")]
    ExecFailed(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SandboxError {
    /// True when the backend reported that the sandbox does not exist
    /// (expired, garbage-collected, or never created).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Api { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
