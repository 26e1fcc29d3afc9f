use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 60 * 60;
pub(crate) const DEFAULT_INACTIVE_AFTER_SECS: u64 = 24 * 60 * 60;
pub(crate) const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
pub(crate) const DEFAULT_PROJECTS_TABLE: &str = "projects";
/// Upper bound for `maintenance.inactive_after_secs` (ten years).
const MAX_INACTIVE_AFTER_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    pub backend: BackendConfig,
    /// Durable project store. Without it projects live in process memory.
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub api_url: String,
    pub domain: String,
    #[serde(default)]
    pub data_plane_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    /// Public key sent as `apikey` on caller-scoped requests.
    pub anon_key: String,
    #[serde(default = "default_projects_table")]
    pub table: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    /// Projects idle longer than this get their sandbox paused.
    pub inactive_after_secs: u64,
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inactive_after_secs: DEFAULT_INACTIVE_AFTER_SECS,
            interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_projects_table() -> String {
    DEFAULT_PROJECTS_TABLE.to_string()
}

/// Load and validate a runner config from a YAML file.
pub async fn load(path: &Path) -> RunnerResult<RunnerConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RunnerError::Config(format!("read {}: {e}", path.display())))?;
    let config: RunnerConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| RunnerError::Config(format!("parse {}: {e}", path.display())))?;
    validate(&config)?;
    Ok(config)
}

fn check_url(url: &str, label: &str) -> RunnerResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    Err(RunnerError::Config(format!(
        "{label} must be an http(s) URL, got {url:?}"
    )))
}

fn check_nonzero(value: u64, label: &str) -> RunnerResult<()> {
    if value == 0 {
        return Err(RunnerError::Config(format!("{label} must be greater than 0")));
    }
    Ok(())
}

fn validate(config: &RunnerConfig) -> RunnerResult<()> {
    check_url(&config.backend.api_url, "backend.api_url")?;
    if let Some(url) = &config.backend.data_plane_url {
        check_url(url, "backend.data_plane_url")?;
    }
    if config.backend.domain.is_empty() {
        return Err(RunnerError::Config("backend.domain is empty".into()));
    }
    check_nonzero(config.backend.request_timeout_secs, "backend.request_timeout_secs")?;
    check_nonzero(config.sandbox.timeout_secs, "sandbox.timeout_secs")?;

    if let Some(store) = &config.store {
        check_url(&store.url, "store.url")?;
        if store.table.is_empty() {
            return Err(RunnerError::Config("store.table is empty".into()));
        }
    }

    if config.maintenance.enabled {
        check_nonzero(
            config.maintenance.inactive_after_secs,
            "maintenance.inactive_after_secs",
        )?;
        check_nonzero(config.maintenance.interval_secs, "maintenance.interval_secs")?;
        if config.maintenance.inactive_after_secs > MAX_INACTIVE_AFTER_SECS {
            return Err(RunnerError::Config(format!(
                "maintenance.inactive_after_secs must be at most {MAX_INACTIVE_AFTER_SECS}"
            )));
        }
    }
    Ok(())
}

impl RunnerConfig {
    /// Build the remote backend config. The API key comes from the CLI/env,
    /// never from the YAML file.
    pub fn remote_config(&self, api_key: String) -> sandbox_remote::RemoteConfig {
        let mut remote = sandbox_remote::RemoteConfig::new(
            self.backend.api_url.clone(),
            api_key,
            self.backend.domain.clone(),
        );
        remote.request_timeout = Duration::from_secs(self.backend.request_timeout_secs);
        remote.data_plane_url = self.backend.data_plane_url.clone();
        remote
    }

    pub fn manager_config(&self) -> sandbox_manager::ManagerConfig {
        sandbox_manager::ManagerConfig {
            sandbox_timeout: Duration::from_secs(self.sandbox.timeout_secs),
        }
    }
}

impl MaintenanceConfig {
    pub fn inactive_after(&self) -> chrono::Duration {
        let secs = self.inactive_after_secs.min(MAX_INACTIVE_AFTER_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or_default())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
