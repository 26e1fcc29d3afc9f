use std::process::ExitCode;

use chrono::Utc;
use clap::Args;
use tracing::{info, warn};

use super::{CommonArgs, build_services};
use crate::config;
use crate::error::RunnerResult;

#[derive(Args)]
pub struct CleanupArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// List what would be paused without touching any sandbox
    #[arg(long)]
    dry_run: bool,
}

/// Pause the sandboxes of every project idle longer than
/// `maintenance.inactive_after_secs`, then exit. Fails if any pause failed.
pub async fn run_cleanup(args: CleanupArgs) -> RunnerResult<ExitCode> {
    let runner_config = config::load(&args.common.config).await?;
    let services = build_services(&runner_config, args.common)?;
    let cutoff = Utc::now() - runner_config.maintenance.inactive_after();

    if args.dry_run {
        let projects = services.store.list_inactive(cutoff).await?;
        for project in &projects {
            info!(
                project_id = %project.id,
                name = %project.name,
                sandbox_id = %project.sandbox_id,
                "would pause"
            );
        }
        info!(count = projects.len(), cutoff = %cutoff, "dry run finished");
        return Ok(ExitCode::SUCCESS);
    }

    let report = services.manager.pause_inactive(cutoff).await?;
    if report.failed > 0 {
        warn!(failed = report.failed, "some sandboxes could not be paused");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
