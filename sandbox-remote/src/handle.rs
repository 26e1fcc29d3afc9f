use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use sandbox::{CodeExecution, CommandOutput, CommandRequest, Result, Sandbox, SandboxError};
use tracing::{debug, info};

use crate::api::{self, CommandBody, ExecuteBody, Paused, SandboxDetail, TimeoutBody};
use crate::client::{self, ApiClient};
use crate::config::{CODE_INTERPRETER_PORT, ENVD_PORT};

/// Upper bound for a single interpreter run.
const CODE_EXEC_TIMEOUT: Duration = Duration::from_secs(300);
/// Extra time granted on top of a command's own timeout for the round trip.
const COMMAND_SLACK: Duration = Duration::from_secs(10);

pub struct RemoteSandbox {
    client: ApiClient,
    id: String,
    domain: String,
    access_token: Option<String>,
}

impl RemoteSandbox {
    pub(crate) fn new(
        client: ApiClient,
        id: String,
        domain: String,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            id,
            domain,
            access_token,
        }
    }

    fn data(&self, method: Method, port: u16, path: &str) -> reqwest::RequestBuilder {
        self.client
            .data(method, &self.host(port), path, self.access_token.as_deref())
    }
}

/// Pause `sandbox_id` and return the id it can be resumed under.
pub(crate) async fn pause_by_id(client: &ApiClient, sandbox_id: &str) -> Result<String> {
    let resp = client::send(
        client.control(Method::POST, &format!("/sandboxes/{sandbox_id}/pause")),
        "pause",
    )
    .await
    .map_err(|e| match e {
        // Gone, or already paused: callers decide whether that matters.
        SandboxError::NotFound(_) | SandboxError::Api { status: 409, .. } => e,
        other => SandboxError::PauseFailed(other.to_string()),
    })?;
    let paused: Option<Paused> = client::decode_optional(resp, "pause").await?;
    let new_id = paused
        .and_then(|p| p.sandbox_id)
        .unwrap_or_else(|| sandbox_id.to_string());
    info!(sandbox_id, new_id = %new_id, "sandbox paused");
    Ok(new_id)
}

#[async_trait]
impl Sandbox for RemoteSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn host(&self, port: u16) -> String {
        format!("{port}-{}.{}", self.id, self.domain)
    }

    async fn is_live(&self) -> Result<bool> {
        let req = self
            .client
            .control(Method::GET, &format!("/sandboxes/{}", self.id));
        let resp = match client::send(req, "get sandbox").await {
            Ok(resp) => resp,
            Err(SandboxError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let detail: SandboxDetail = resp
            .json()
            .await
            .map_err(|e| SandboxError::Transport(format!("get sandbox decode: {e}")))?;
        Ok(detail.state == "running")
    }

    async fn set_timeout(&self, timeout: Duration) -> Result<()> {
        let req = self
            .client
            .control(Method::POST, &format!("/sandboxes/{}/timeout", self.id))
            .json(&TimeoutBody {
                timeout: timeout.as_secs(),
            });
        client::send(req, "set timeout").await?;
        debug!(sandbox_id = %self.id, secs = timeout.as_secs(), "timeout refreshed");
        Ok(())
    }

    async fn pause(&self) -> Result<String> {
        pause_by_id(&self.client, &self.id).await
    }

    async fn kill(&self) -> Result<()> {
        let req = self
            .client
            .control(Method::DELETE, &format!("/sandboxes/{}", self.id));
        match client::send(req, "kill").await {
            Ok(_) | Err(SandboxError::NotFound(_)) => {
                info!(sandbox_id = %self.id, "sandbox killed");
                Ok(())
            }
            Err(e) => Err(SandboxError::KillFailed(e.to_string())),
        }
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let req = self
            .data(Method::POST, ENVD_PORT, "/files")
            .query(&[("path", path)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec());
        client::send(req, "write file")
            .await
            .map_err(|e| SandboxError::ExecFailed(format!("write {path}: {e}")))?;
        Ok(())
    }

    async fn run_command(&self, request: &CommandRequest<'_>) -> Result<CommandOutput> {
        let req = self
            .data(Method::POST, ENVD_PORT, "/commands")
            .timeout(request.timeout + COMMAND_SLACK)
            .json(&CommandBody {
                cmd: request.cmd,
                timeout_ms: u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX),
            });
        let resp = client::send(req, "run command").await?;
        resp.json()
            .await
            .map_err(|e| SandboxError::ExecFailed(format!("run command decode: {e}")))
    }

    async fn run_code(&self, code: &str) -> Result<CodeExecution> {
        let req = self
            .data(Method::POST, CODE_INTERPRETER_PORT, "/execute")
            .timeout(CODE_EXEC_TIMEOUT)
            .json(&ExecuteBody { code });
        let resp = client::send(req, "run code").await?;
        let body = resp
            .text()
            .await
            .map_err(|e| SandboxError::Transport(format!("run code body: {e}")))?;
        api::fold_events(&body).map_err(|e| SandboxError::ExecFailed(format!("run code stream: {e}")))
    }
}
