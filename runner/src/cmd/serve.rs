use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use sandbox_manager::SandboxManager;
use tokio::sync::watch;
use tracing::{error, info};

use super::{CommonArgs, build_services};
use crate::config::{self, MaintenanceConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::server::{self, AppState};

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    common: CommonArgs,
}

/// Serve the HTTP API and run the idle sweep until SIGINT/SIGTERM.
pub async fn run_serve(args: ServeArgs) -> RunnerResult<()> {
    let runner_config = config::load(&args.common.config).await?;
    let services = build_services(&runner_config, args.common)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = recv_signal(&mut sigterm) => info!("received SIGTERM, stopping"),
            _ = recv_signal(&mut sigint) => info!("received SIGINT, stopping"),
        }
        let _ = shutdown_tx.send(true);
    });

    let sweeper = if runner_config.maintenance.enabled {
        Some(tokio::spawn(sweep_loop(
            services.manager.clone(),
            runner_config.maintenance,
            shutdown_rx.clone(),
        )))
    } else {
        info!("idle sweep disabled");
        None
    };

    let app = server::router(AppState {
        manager: services.manager.clone(),
        store: services.store,
    });
    let listener = tokio::net::TcpListener::bind(runner_config.listen).await?;
    info!(listen = %runner_config.listen, "runner listening");

    let mut rx = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = rx.changed().await;
        })
        .await
        .map_err(|e| RunnerError::Internal(format!("server: {e}")))?;

    if let Some(handle) = sweeper
        && let Err(e) = handle.await
    {
        error!(error = %e, "idle sweep task panicked");
    }

    info!(cached = services.manager.cached_projects().len(), "runner stopped");
    Ok(())
}

/// Pause idle projects every `interval` until shutdown.
async fn sweep_loop(
    manager: Arc<SandboxManager>,
    maintenance: MaintenanceConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = maintenance.interval();
    info!(interval_secs = interval.as_secs(), "idle sweep started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => return,
        }

        let cutoff = Utc::now() - maintenance.inactive_after();
        if let Err(e) = manager.pause_inactive(cutoff).await {
            error!(error = %e, "idle sweep failed");
        }
    }
}

/// Await a signal if registered, or pend forever if registration failed.
async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
