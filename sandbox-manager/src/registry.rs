use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sandbox::Sandbox;
use tokio::sync::OwnedMutexGuard;

/// In-memory map of project id to its live sandbox handle.
///
/// Owned by one manager instance. The map lock is only held for the map
/// operation itself, never across backend I/O.
#[derive(Default)]
pub struct SandboxRegistry {
    entries: Mutex<HashMap<String, Arc<dyn Sandbox>>>,
}

impl SandboxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn Sandbox>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, project_id: &str) -> Option<Arc<dyn Sandbox>> {
        self.entries().get(project_id).cloned()
    }

    /// Insert or overwrite the entry, returning the displaced handle.
    pub fn insert(&self, project_id: &str, handle: Arc<dyn Sandbox>) -> Option<Arc<dyn Sandbox>> {
        self.entries().insert(project_id.to_string(), handle)
    }

    pub fn remove(&self, project_id: &str) -> Option<Arc<dyn Sandbox>> {
        self.entries().remove(project_id)
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.entries().contains_key(project_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Cached project ids, sorted.
    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Per-project mutual exclusion.
///
/// Serializes every decide-and-mutate sequence for one project id while
/// different projects proceed in parallel. Slots are created on demand.
/// Every guard release drops all slots nobody holds or waits on, including
/// ones left behind by a `lock` future cancelled while it waited.
#[derive(Default)]
pub struct ProjectLocks {
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Holds a project's lock until dropped.
pub struct ProjectGuard<'a> {
    locks: &'a ProjectLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn lock(&self, project_id: &str) -> ProjectGuard<'_> {
        let slot = Arc::clone(self.slots().entry(project_id.to_string()).or_default());
        let guard = slot.lock_owned().await;
        ProjectGuard {
            locks: self,
            guard: Some(guard),
        }
    }

    /// Number of lock slots currently tracked.
    pub fn active(&self) -> usize {
        self.slots().len()
    }
}

impl Drop for ProjectGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: no holder, no waiter. Clones
        // are only taken under the map lock, so none can appear meanwhile.
        self.locks
            .slots()
            .retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}
