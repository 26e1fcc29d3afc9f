use std::time::Duration;

/// Port of the in-sandbox daemon serving files and commands.
pub const ENVD_PORT: u16 = 49983;
/// Port of the in-sandbox code interpreter.
pub const CODE_INTERPRETER_PORT: u16 = 49999;
/// Default timeout for control plane requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Control plane base URL, e.g. `https://api.example.dev`.
    pub api_url: String,
    pub api_key: String,
    /// Domain that sandbox hosts live under (`{port}-{id}.{domain}`).
    pub domain: String,
    pub request_timeout: Duration,
    /// Send every data plane request to this base URL instead of the
    /// per-sandbox host. Used for local development and tests.
    pub data_plane_url: Option<String>,
}

impl RemoteConfig {
    pub fn new(api_url: String, api_key: String, domain: String) -> Self {
        Self {
            api_url,
            api_key,
            domain,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            data_plane_url: None,
        }
    }
}
