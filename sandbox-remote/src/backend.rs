use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use sandbox::{CreateOptions, Result, Sandbox, SandboxBackend, SandboxError};
use tracing::info;

use crate::api::{NewSandbox, SandboxCreated, TimeoutBody};
use crate::client::{self, ApiClient};
use crate::config::RemoteConfig;
use crate::handle::{self as remote, RemoteSandbox};

pub struct RemoteBackend {
    client: ApiClient,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
        })
    }

    fn attach(&self, created: SandboxCreated) -> Arc<dyn Sandbox> {
        let domain = created
            .domain
            .unwrap_or_else(|| self.client.config().domain.clone());
        Arc::new(RemoteSandbox::new(
            self.client.clone(),
            created.sandbox_id,
            domain,
            created.envd_access_token,
        ))
    }
}

#[async_trait]
impl SandboxBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn create(&self, options: CreateOptions) -> Result<Arc<dyn Sandbox>> {
        let mut req = self
            .client
            .control(Method::POST, "/sandboxes")
            .json(&NewSandbox {
                template_id: &options.template_id,
                timeout: options.timeout.as_secs(),
                metadata: &options.metadata,
            });
        for (name, value) in &options.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = client::send(req, "create")
            .await
            .map_err(|e| SandboxError::CreationFailed(e.to_string()))?;
        let created: SandboxCreated = resp
            .json()
            .await
            .map_err(|e| SandboxError::CreationFailed(format!("create decode: {e}")))?;

        info!(
            sandbox_id = %created.sandbox_id,
            template = %options.template_id,
            "sandbox created"
        );
        Ok(self.attach(created))
    }

    async fn resume(&self, sandbox_id: &str, timeout: Duration) -> Result<Arc<dyn Sandbox>> {
        let req = self
            .client
            .control(Method::POST, &format!("/sandboxes/{sandbox_id}/resume"))
            .json(&TimeoutBody {
                timeout: timeout.as_secs(),
            });
        let resp = client::send(req, "resume").await.map_err(|e| match e {
            SandboxError::NotFound(_) => e,
            other => SandboxError::ResumeFailed(other.to_string()),
        })?;
        let created: SandboxCreated = resp
            .json()
            .await
            .map_err(|e| SandboxError::ResumeFailed(format!("resume decode: {e}")))?;

        info!(sandbox_id = %created.sandbox_id, "sandbox resumed");
        Ok(self.attach(created))
    }

    async fn pause_detached(&self, sandbox_id: &str) -> Result<String> {
        remote::pause_by_id(&self.client, sandbox_id).await
    }
}
