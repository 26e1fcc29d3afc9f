use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::error::{RunnerError, RunnerResult};

/// Default timeout for store requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client for the project store. Owns the connection pool and
/// base URL. Clone is a cheap Arc refcount bump.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: String) -> RunnerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RunnerError::Internal(format!("http client: {e}")))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!(base_url = %base_url, "http client initialized");

        Ok(Self {
            inner: Arc::new(Inner { client, base_url }),
        })
    }

    /// Build a request with bearer token and `apikey` header.
    ///
    /// `path` is appended to the base URL (e.g. `/rest/v1/projects`).
    pub fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        api_key: &str,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        self.inner
            .client
            .request(method, url)
            .header("apikey", api_key)
            .bearer_auth(token)
    }
}
