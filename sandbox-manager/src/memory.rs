use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::store::{Credentials, InactiveProject, ProjectStore, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub name: String,
    pub sandbox_id: Option<String>,
    pub last_activity: DateTime<Utc>,
}

/// Process-local [`ProjectStore`] for development and tests.
///
/// Reads and writes can be made to fail on demand to exercise the
/// manager's soft-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    projects: HashMap<String, ProjectRecord>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

impl MemoryState {
    /// Writes to a project nobody inserted create its record.
    fn record_mut(&mut self, project_id: &str) -> &mut ProjectRecord {
        self.projects
            .entry(project_id.to_string())
            .or_insert_with(|| ProjectRecord {
                name: project_id.to_string(),
                sandbox_id: None,
                last_activity: Utc::now(),
            })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_project(&self, project_id: &str, name: &str, sandbox_id: Option<&str>) {
        self.insert_record(
            project_id,
            ProjectRecord {
                name: name.to_string(),
                sandbox_id: sandbox_id.map(String::from),
                last_activity: Utc::now(),
            },
        );
    }

    pub fn insert_record(&self, project_id: &str, record: ProjectRecord) {
        self.state().projects.insert(project_id.to_string(), record);
    }

    pub fn project(&self, project_id: &str) -> Option<ProjectRecord> {
        self.state().projects.get(project_id).cloned()
    }

    pub fn sandbox_id(&self, project_id: &str) -> Option<String> {
        self.project(project_id).and_then(|p| p.sandbox_id)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Number of successful writes (sandbox id updates and touches).
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn read_sandbox_id(
        &self,
        project_id: &str,
        _credentials: Option<&Credentials>,
    ) -> StoreResult<Option<String>> {
        let state = self.state();
        if state.fail_reads {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(state
            .projects
            .get(project_id)
            .and_then(|p| p.sandbox_id.clone()))
    }

    async fn write_sandbox_id(
        &self,
        project_id: &str,
        sandbox_id: Option<&str>,
        activity: Option<DateTime<Utc>>,
        _credentials: Option<&Credentials>,
    ) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        let project = state.record_mut(project_id);
        project.sandbox_id = sandbox_id.map(String::from);
        if let Some(at) = activity {
            project.last_activity = at;
        }
        state.writes += 1;
        Ok(())
    }

    async fn touch(
        &self,
        project_id: &str,
        at: DateTime<Utc>,
        _credentials: Option<&Credentials>,
    ) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        state.record_mut(project_id).last_activity = at;
        state.writes += 1;
        Ok(())
    }

    async fn list_inactive(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<InactiveProject>> {
        let state = self.state();
        if state.fail_reads {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        let mut inactive: Vec<InactiveProject> = state
            .projects
            .iter()
            .filter(|(_, p)| p.last_activity < cutoff)
            .filter_map(|(id, p)| {
                p.sandbox_id.as_ref().map(|sandbox_id| InactiveProject {
                    id: id.clone(),
                    name: p.name.clone(),
                    sandbox_id: sandbox_id.clone(),
                })
            })
            .collect();
        inactive.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(inactive)
    }

    async fn last_activity(&self, project_id: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let state = self.state();
        if state.fail_reads {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(state.projects.get(project_id).map(|p| p.last_activity))
    }
}
