use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::CreateOptions;
use crate::error::Result;
use crate::sandbox::Sandbox;

#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Human-readable name for this backend implementation (e.g. "remote").
    fn name(&self) -> &str;
    /// Instantiate a new sandbox from a template.
    async fn create(&self, options: CreateOptions) -> Result<Arc<dyn Sandbox>>;
    /// Reattach to a previously paused (or still running) sandbox by id.
    async fn resume(&self, sandbox_id: &str, timeout: Duration) -> Result<Arc<dyn Sandbox>>;
    /// Pause a sandbox this process holds no handle for. Returns the id
    /// under which it can later be resumed.
    async fn pause_detached(&self, sandbox_id: &str) -> Result<String>;
}
