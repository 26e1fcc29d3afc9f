use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CodeExecution, CommandOutput, CommandRequest};

/// A handle to one remote sandbox.
///
/// Handles are shared (`Arc<dyn Sandbox>`) between the lifecycle registry and
/// in-flight requests, so every operation takes `&self`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    // -- identity --
    fn id(&self) -> &str;
    /// Public host name that routes to `port` inside the sandbox.
    fn host(&self, port: u16) -> String;

    // -- lifecycle --
    /// Ask the backend whether the sandbox is still running. Backend-side
    /// expiry flips this to `false` without notifying anyone.
    async fn is_live(&self) -> Result<bool>;
    /// Reset the idle deadline to `timeout` from now.
    async fn set_timeout(&self, timeout: Duration) -> Result<()>;
    /// Pause the sandbox. Returns the id under which it can be resumed,
    /// which may differ from [`Sandbox::id`].
    async fn pause(&self) -> Result<String>;
    async fn kill(&self) -> Result<()>;

    // -- operations --
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn run_command(&self, request: &CommandRequest<'_>) -> Result<CommandOutput>;
    async fn run_code(&self, code: &str) -> Result<CodeExecution>;
}
