use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sandbox::{CreateOptions, DEFAULT_SANDBOX_TIMEOUT, Sandbox, SandboxBackend};
use tracing::{debug, info, warn};

use crate::error::{ManagerError, ManagerResult};
use crate::maintenance::already_settled;
use crate::outcome::{AcquireSource, Acquired, Outcome, SoftFailure};
use crate::registry::{ProjectLocks, SandboxRegistry};
use crate::store::{Credentials, ProjectStore};

/// Header carrying the team id on create requests.
pub const TEAM_HEADER: &str = "X-Supabase-Team";
/// Header carrying the caller's access token on create requests.
pub const TEAM_TOKEN_HEADER: &str = "X-Supabase-Token";

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Idle deadline applied on create, resume and every cache hit.
    pub sandbox_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            sandbox_timeout: DEFAULT_SANDBOX_TIMEOUT,
        }
    }
}

/// Result of pausing whatever handle the registry holds for a project.
pub(crate) enum CachedPause {
    /// Nothing cached.
    Absent,
    /// The backend reported the sandbox already paused or gone. The entry
    /// is evicted and the store left untouched.
    Settled,
    Attempted(Outcome),
}

#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub project_id: String,
    pub template_id: String,
    pub team_id: Option<String>,
    pub credentials: Option<Credentials>,
}

impl AcquireRequest {
    pub fn new(project_id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            template_id: template_id.into(),
            team_id: None,
            credentials: None,
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Produces ready sandboxes for projects and keeps the stored sandbox id
/// reasonably in sync with what the backend actually holds.
///
/// Every operation on a project runs inside that project's lock, so
/// concurrent callers for one project collapse into a single backend
/// create/resume while other projects are unaffected.
pub struct SandboxManager {
    backend: Arc<dyn SandboxBackend>,
    store: Arc<dyn ProjectStore>,
    registry: SandboxRegistry,
    locks: ProjectLocks,
    config: ManagerConfig,
}

impl SandboxManager {
    pub fn new(
        backend: Arc<dyn SandboxBackend>,
        store: Arc<dyn ProjectStore>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            backend,
            store,
            registry: SandboxRegistry::new(),
            locks: ProjectLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub(crate) fn backend(&self) -> &dyn SandboxBackend {
        self.backend.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn ProjectStore {
        self.store.as_ref()
    }

    pub(crate) fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    pub fn is_cached(&self, project_id: &str) -> bool {
        self.registry.contains(project_id)
    }

    pub fn cached_projects(&self) -> Vec<String> {
        self.registry.project_ids()
    }

    /// Return a live sandbox for the project, preferring the cached handle,
    /// then a resume of the stored id, then a fresh sandbox.
    ///
    /// Fails only when a new sandbox was needed and the backend could not
    /// create one.
    pub async fn get_or_create(&self, request: &AcquireRequest) -> ManagerResult<Acquired> {
        let _guard = self.locks.lock(&request.project_id).await;
        let mut outcome = Outcome::default();

        if let Some(handle) = self.cached_live(&request.project_id, &mut outcome).await {
            return Ok(Acquired {
                handle,
                source: AcquireSource::Cached,
                outcome,
            });
        }

        if let Some(handle) = self.resume_stored(request, &mut outcome).await {
            self.registry.insert(&request.project_id, Arc::clone(&handle));
            return Ok(Acquired {
                handle,
                source: AcquireSource::Resumed,
                outcome,
            });
        }

        let handle = self.create(request, &mut outcome).await?;
        self.registry.insert(&request.project_id, Arc::clone(&handle));
        Ok(Acquired {
            handle,
            source: AcquireSource::Created,
            outcome,
        })
    }

    /// The cached handle if it is still running and its deadline could be
    /// pushed out. An entry that fails the liveness check is evicted.
    async fn cached_live(&self, project_id: &str, outcome: &mut Outcome) -> Option<Arc<dyn Sandbox>> {
        let handle = self.registry.get(project_id)?;
        match handle.is_live().await {
            Ok(true) => {}
            Ok(false) => {
                info!(project_id, sandbox_id = %handle.id(), "cached sandbox no longer running");
                self.registry.remove(project_id);
                return None;
            }
            Err(e) => {
                warn!(project_id, sandbox_id = %handle.id(), error = %e, "liveness check failed");
                outcome.record(SoftFailure::LivenessCheck(e.to_string()));
                self.registry.remove(project_id);
                return None;
            }
        }

        if let Err(e) = handle.set_timeout(self.config.sandbox_timeout).await {
            warn!(project_id, sandbox_id = %handle.id(), error = %e, "timeout refresh failed");
            outcome.record(SoftFailure::TimeoutRefresh(e.to_string()));
            return None;
        }

        debug!(project_id, sandbox_id = %handle.id(), "using cached sandbox");
        Some(handle)
    }

    /// Resume the sandbox named by the stored id. Any failure here is
    /// expected (stale id, expired sandbox) and only falls through to create.
    async fn resume_stored(
        &self,
        request: &AcquireRequest,
        outcome: &mut Outcome,
    ) -> Option<Arc<dyn Sandbox>> {
        let project_id = request.project_id.as_str();
        let sandbox_id = match self
            .store
            .read_sandbox_id(project_id, request.credentials.as_ref())
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(e) => {
                warn!(project_id, error = %e, "failed to read stored sandbox id");
                outcome.record(SoftFailure::StoreRead(e.to_string()));
                return None;
            }
        };

        info!(project_id, sandbox_id = %sandbox_id, "resuming sandbox");
        match self
            .backend
            .resume(&sandbox_id, self.config.sandbox_timeout)
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                info!(project_id, sandbox_id = %sandbox_id, error = %e, "resume failed, creating new sandbox");
                outcome.record(SoftFailure::Resume {
                    sandbox_id,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    async fn create(
        &self,
        request: &AcquireRequest,
        outcome: &mut Outcome,
    ) -> ManagerResult<Arc<dyn Sandbox>> {
        let project_id = request.project_id.as_str();
        let mut options = CreateOptions::new(request.template_id.as_str())
            .with_timeout(self.config.sandbox_timeout)
            .with_metadata("projectId", project_id)
            .with_metadata("teamId", request.team_id.as_deref().unwrap_or_default());
        if let (Some(team_id), Some(credentials)) = (&request.team_id, &request.credentials) {
            options = options
                .with_header(TEAM_HEADER, team_id.as_str())
                .with_header(TEAM_TOKEN_HEADER, credentials.access_token());
        }

        info!(project_id, template = %request.template_id, "creating sandbox");
        let handle = self
            .backend
            .create(options)
            .await
            .map_err(|source| ManagerError::CreateFailed {
                project_id: project_id.to_string(),
                source,
            })?;

        if let Err(e) = self
            .store
            .write_sandbox_id(
                project_id,
                Some(handle.id()),
                Some(Utc::now()),
                request.credentials.as_ref(),
            )
            .await
        {
            // The handle still serves this request; the stored id stays stale
            // until the next successful write.
            warn!(project_id, sandbox_id = %handle.id(), error = %e, "failed to record sandbox id");
            outcome.record(SoftFailure::StoreWrite(e.to_string()));
        }

        Ok(handle)
    }

    /// Pause the project's cached sandbox and persist the id it can be
    /// resumed under. Without a cached handle this is a no-op.
    pub async fn pause(&self, project_id: &str) -> Outcome {
        let _guard = self.locks.lock(project_id).await;
        match self.pause_locked(project_id).await {
            CachedPause::Attempted(outcome) => outcome,
            CachedPause::Absent | CachedPause::Settled => Outcome::default(),
        }
    }

    /// [`SandboxManager::pause`] for callers already holding the project lock.
    pub(crate) async fn pause_locked(&self, project_id: &str) -> CachedPause {
        let Some(handle) = self.registry.get(project_id) else {
            debug!(project_id, "no cached sandbox to pause");
            return CachedPause::Absent;
        };

        let mut outcome = Outcome::default();
        info!(project_id, sandbox_id = %handle.id(), "pausing sandbox");
        let paused_id = match handle.pause().await {
            Ok(id) => id,
            Err(e) if already_settled(&e) => {
                info!(project_id, sandbox_id = %handle.id(), error = %e, "cached sandbox already paused or gone");
                self.registry.remove(project_id);
                return CachedPause::Settled;
            }
            Err(e) => {
                warn!(project_id, sandbox_id = %handle.id(), error = %e, "failed to pause sandbox");
                outcome.record(SoftFailure::Pause(e.to_string()));
                return CachedPause::Attempted(outcome);
            }
        };

        if let Err(e) = self
            .store
            .write_sandbox_id(project_id, Some(paused_id.as_str()), None, None)
            .await
        {
            warn!(project_id, sandbox_id = %paused_id, error = %e, "failed to record paused sandbox id");
            outcome.record(SoftFailure::StoreWrite(e.to_string()));
        }

        // A paused handle cannot serve requests until resumed.
        self.registry.remove(project_id);
        CachedPause::Attempted(outcome)
    }

    /// Terminate the project's sandbox and forget its id everywhere.
    pub async fn kill(&self, project_id: &str) -> Outcome {
        let _guard = self.locks.lock(project_id).await;
        let mut outcome = Outcome::default();

        if let Some(handle) = self.registry.remove(project_id) {
            info!(project_id, sandbox_id = %handle.id(), "killing sandbox");
            if let Err(e) = handle.kill().await {
                warn!(project_id, sandbox_id = %handle.id(), error = %e, "failed to kill sandbox");
                outcome.record(SoftFailure::Kill(e.to_string()));
            }
        }

        if let Err(e) = self.store.write_sandbox_id(project_id, None, None, None).await {
            warn!(project_id, error = %e, "failed to clear stored sandbox id");
            outcome.record(SoftFailure::StoreWrite(e.to_string()));
        }

        outcome
    }
}
