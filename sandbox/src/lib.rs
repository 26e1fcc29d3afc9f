mod backend;
mod config;
mod error;
mod sandbox;
mod types;

pub use backend::SandboxBackend;
pub use config::{CreateOptions, DEFAULT_SANDBOX_TIMEOUT};
pub use error::{Result, SandboxError};
pub use sandbox::Sandbox;
pub use types::{CellResult, CodeExecution, CommandOutput, CommandRequest, ExecutionError};
