use std::sync::Arc;

use reqwest::{Client, StatusCode};
use sandbox::{Result, SandboxError};

use crate::config::RemoteConfig;

/// Shared HTTP client for the control and data plane. Owns the connection
/// pool and config. Clone is a cheap Arc refcount bump.
#[derive(Clone)]
pub(crate) struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    config: RemoteConfig,
}

impl ApiClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if config.api_url.is_empty() {
            return Err(SandboxError::InvalidConfig("api_url is empty".into()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SandboxError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner { client, config }),
        })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.inner.config
    }

    /// Build a control plane request. `path` is appended to the API URL.
    pub fn control(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.inner.config.api_url.trim_end_matches('/'));
        self.inner
            .client
            .request(method, url)
            .header("X-API-Key", &self.inner.config.api_key)
    }

    /// Build a data plane request against the daemon listening on `port`
    /// inside the sandbox.
    pub fn data(
        &self,
        method: reqwest::Method,
        host: &str,
        path: &str,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let base = match &self.inner.config.data_plane_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{host}"),
        };
        let mut req = self.inner.client.request(method, format!("{base}{path}"));
        if let Some(token) = access_token {
            req = req.header("X-Access-Token", token);
        }
        req
    }
}

/// Send a request, mapping transport failures and non-2xx statuses.
///
/// `404` becomes [`SandboxError::NotFound`] so callers can tell an expired
/// sandbox apart from a backend outage.
pub(crate) async fn send(req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
    let resp = req.send().await.map_err(|e| {
        if e.is_timeout() {
            SandboxError::Timeout(format!("{what}: {e}"))
        } else {
            SandboxError::Transport(format!("{what}: {e}"))
        }
    })?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(SandboxError::NotFound(format!("{what}: {body}")));
    }
    Err(SandboxError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, tolerating an empty response (e.g. `204`).
pub(crate) async fn decode_optional<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<Option<T>> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| SandboxError::Transport(format!("{what} body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| SandboxError::Transport(format!("{what} decode: {e}")))
}
