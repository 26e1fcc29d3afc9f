use chrono::{DateTime, Utc};
use sandbox::SandboxError;
use serde::Serialize;
use tracing::{info, warn};

use crate::manager::{CachedPause, SandboxManager};
use crate::store::{InactiveProject, StoreResult};

/// Counters from one idle sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub inspected: usize,
    pub paused: usize,
    /// Already paused or gone on the backend side.
    pub skipped: usize,
    pub failed: usize,
}

enum SweepResult {
    Paused,
    Skipped,
    Failed,
}

/// Sandbox already paused (`409`) or no longer known to the backend.
pub(crate) fn already_settled(err: &SandboxError) -> bool {
    err.is_not_found() || matches!(err, SandboxError::Api { status: 409, .. })
}

impl SandboxManager {
    /// Pause the sandboxes of every project idle since before `cutoff`.
    ///
    /// Each project's activity is re-read under its lock and skipped if it
    /// moved past `cutoff`. Projects with a cached handle go through
    /// [`SandboxManager::pause`]; the rest are paused by their stored id.
    /// A failure on one project never stops the sweep. Only a failure to
    /// list projects is returned.
    pub async fn pause_inactive(&self, cutoff: DateTime<Utc>) -> StoreResult<SweepReport> {
        let projects = self.store().list_inactive(cutoff).await?;
        info!(count = projects.len(), cutoff = %cutoff, "found inactive projects");

        let mut report = SweepReport::default();
        for project in &projects {
            report.inspected += 1;
            match self.pause_project(project, cutoff).await {
                SweepResult::Paused => report.paused += 1,
                SweepResult::Skipped => report.skipped += 1,
                SweepResult::Failed => report.failed += 1,
            }
        }

        info!(
            inspected = report.inspected,
            paused = report.paused,
            skipped = report.skipped,
            failed = report.failed,
            "inactive project sweep finished"
        );
        Ok(report)
    }

    async fn pause_project(&self, project: &InactiveProject, cutoff: DateTime<Utc>) -> SweepResult {
        let _guard = self.locks().lock(&project.id).await;

        // The listing is a snapshot; a request may have landed since.
        match self.store().last_activity(&project.id).await {
            Ok(Some(at)) if at >= cutoff => {
                info!(project_id = %project.id, last_activity = %at, "project active again, not pausing");
                return SweepResult::Skipped;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(project_id = %project.id, error = %e, "failed to re-read project activity");
                return SweepResult::Failed;
            }
        }

        match self.pause_locked(&project.id).await {
            CachedPause::Absent => {}
            CachedPause::Settled => return SweepResult::Skipped,
            CachedPause::Attempted(outcome) if outcome.is_clean() => {
                info!(project_id = %project.id, name = %project.name, "paused idle project");
                return SweepResult::Paused;
            }
            CachedPause::Attempted(_) => return SweepResult::Failed,
        }

        let paused_id = match self.backend().pause_detached(&project.sandbox_id).await {
            Ok(id) => id,
            Err(e) if already_settled(&e) => {
                info!(project_id = %project.id, sandbox_id = %project.sandbox_id, "sandbox already paused or gone");
                return SweepResult::Skipped;
            }
            Err(e) => {
                warn!(project_id = %project.id, name = %project.name, error = %e, "failed to pause idle project");
                return SweepResult::Failed;
            }
        };

        if paused_id != project.sandbox_id
            && let Err(e) = self
                .store()
                .write_sandbox_id(&project.id, Some(paused_id.as_str()), None, None)
                .await
        {
            warn!(project_id = %project.id, sandbox_id = %paused_id, error = %e, "failed to record paused sandbox id");
            return SweepResult::Failed;
        }

        info!(project_id = %project.id, name = %project.name, "paused idle project");
        SweepResult::Paused
    }
}
