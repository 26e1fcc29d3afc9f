#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("sandbox error: {0}")]
    Sandbox(#[from] sandbox::SandboxError),

    #[error(transparent)]
    Manager(#[from] sandbox_manager::ManagerError),

    #[error("store error: {0}")]
    Store(#[from] sandbox_manager::StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
