use sandbox::SandboxError;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Neither the cache nor a resume produced a sandbox and the backend
    /// refused to create one.
    #[error("no sandbox available for project {project_id}: {source}")]
    CreateFailed {
        project_id: String,
        #[source]
        source: SandboxError,
    },
}

pub type ManagerResult<T> = Result<T, ManagerError>;
