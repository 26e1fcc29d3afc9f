mod cleanup;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use sandbox::SandboxBackend;
use sandbox_manager::{MemoryStore, ProjectStore, SandboxManager};
use sandbox_remote::RemoteBackend;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};
use crate::http::HttpClient;
use crate::store::RestProjectStore;

pub use cleanup::{CleanupArgs, run_cleanup};
pub use serve::{ServeArgs, run_serve};

/// Config path and secrets shared by every subcommand. Secrets come from
/// the command line or environment, never from the config file.
#[derive(Args)]
pub struct CommonArgs {
    /// Path to runner.yaml config file
    #[arg(long, short)]
    config: PathBuf,
    /// Sandbox service API key
    #[arg(long, env = "SANDBOX_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Service key for the project store (required when `store` is configured)
    #[arg(long, env = "STORE_SERVICE_KEY", hide_env_values = true)]
    store_service_key: Option<String>,
}

struct Services {
    manager: Arc<SandboxManager>,
    store: Arc<dyn ProjectStore>,
}

fn build_services(config: &RunnerConfig, args: CommonArgs) -> RunnerResult<Services> {
    let backend = RemoteBackend::new(config.remote_config(args.api_key))?;
    info!(
        backend = backend.name(),
        api_url = %config.backend.api_url,
        "sandbox backend configured"
    );

    let store: Arc<dyn ProjectStore> = match &config.store {
        Some(store_config) => {
            let service_key = args.store_service_key.ok_or_else(|| {
                RunnerError::Config(
                    "store requires a service key (--store-service-key / STORE_SERVICE_KEY)"
                        .into(),
                )
            })?;
            let http = HttpClient::new(store_config.url.clone())?;
            Arc::new(RestProjectStore::new(
                http,
                store_config.table.clone(),
                store_config.anon_key.clone(),
                service_key,
            ))
        }
        None => {
            warn!("no store configured, project state is kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let manager = Arc::new(SandboxManager::new(
        Arc::new(backend),
        store.clone(),
        config.manager_config(),
    ));
    Ok(Services { manager, store })
}
