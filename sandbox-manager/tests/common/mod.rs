#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sandbox::{
    CodeExecution, CommandOutput, CommandRequest, CreateOptions, Result, Sandbox, SandboxBackend,
    SandboxError,
};
use sandbox_manager::{ManagerConfig, MemoryStore, SandboxManager};

pub struct FakeSandbox {
    id: String,
    live: AtomicBool,
    fail_liveness: AtomicBool,
    fail_timeout: AtomicBool,
    fail_pause: AtomicBool,
    fail_kill: AtomicBool,
    /// Id returned by `pause`; defaults to the sandbox's own id.
    pause_id: Mutex<Option<String>>,
    timeout_refreshes: AtomicUsize,
    pauses: AtomicUsize,
    kills: AtomicUsize,
}

impl FakeSandbox {
    fn new(id: String) -> Self {
        Self {
            id,
            live: AtomicBool::new(true),
            fail_liveness: AtomicBool::new(false),
            fail_timeout: AtomicBool::new(false),
            fail_pause: AtomicBool::new(false),
            fail_kill: AtomicBool::new(false),
            pause_id: Mutex::new(None),
            timeout_refreshes: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            kills: AtomicUsize::new(0),
        }
    }

    pub fn expire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn fail_liveness(&self) {
        self.fail_liveness.store(true, Ordering::SeqCst);
    }

    pub fn fail_timeout(&self) {
        self.fail_timeout.store(true, Ordering::SeqCst);
    }

    pub fn fail_pause(&self) {
        self.fail_pause.store(true, Ordering::SeqCst);
    }

    pub fn fail_kill(&self) {
        self.fail_kill.store(true, Ordering::SeqCst);
    }

    pub fn pause_as(&self, id: &str) {
        *self.pause_id.lock().unwrap() = Some(id.to_string());
    }

    pub fn timeout_refreshes(&self) -> usize {
        self.timeout_refreshes.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn host(&self, port: u16) -> String {
        format!("{port}-{}.fake.test", self.id)
    }

    async fn is_live(&self) -> Result<bool> {
        if self.fail_liveness.load(Ordering::SeqCst) {
            return Err(SandboxError::Transport("connection reset".into()));
        }
        Ok(self.live.load(Ordering::SeqCst))
    }

    async fn set_timeout(&self, _timeout: Duration) -> Result<()> {
        if self.fail_timeout.load(Ordering::SeqCst) {
            return Err(SandboxError::Api {
                status: 500,
                body: "timeout update failed".into(),
            });
        }
        self.timeout_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<String> {
        if self.fail_pause.load(Ordering::SeqCst) {
            return Err(SandboxError::PauseFailed("backend busy".into()));
        }
        if !self.live.load(Ordering::SeqCst) {
            return Err(SandboxError::NotFound(self.id.clone()));
        }
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        let id = self.pause_id.lock().unwrap().clone();
        Ok(id.unwrap_or_else(|| self.id.clone()))
    }

    async fn kill(&self) -> Result<()> {
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(SandboxError::KillFailed("backend busy".into()));
        }
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn write_file(&self, _path: &str, _content: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn run_command(&self, _request: &CommandRequest<'_>) -> Result<CommandOutput> {
        Ok(CommandOutput::default())
    }

    async fn run_code(&self, _code: &str) -> Result<CodeExecution> {
        Ok(CodeExecution::default())
    }
}

/// In-process backend that counts every create/resume/pause call.
///
/// New sandboxes are numbered `sbx-1`, `sbx-2`, ... Only ids listed via
/// [`FakeBackend::allow_resume`] can be resumed.
#[derive(Default)]
pub struct FakeBackend {
    next_id: AtomicUsize,
    creates: AtomicUsize,
    resumes: AtomicUsize,
    detached_pauses: AtomicUsize,
    fail_create: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    resumable: Mutex<HashSet<String>>,
    sandboxes: Mutex<HashMap<String, Arc<FakeSandbox>>>,
    last_create: Mutex<Option<CreateOptions>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn allow_resume(&self, sandbox_id: &str) {
        self.resumable.lock().unwrap().insert(sandbox_id.to_string());
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn delay_create(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn detached_pauses(&self) -> usize {
        self.detached_pauses.load(Ordering::SeqCst)
    }

    pub fn last_create(&self) -> Option<CreateOptions> {
        self.last_create.lock().unwrap().clone()
    }

    pub fn sandbox(&self, id: &str) -> Arc<FakeSandbox> {
        Arc::clone(&self.sandboxes.lock().unwrap()[id])
    }

    fn track(&self, id: String) -> Arc<FakeSandbox> {
        let sandbox = Arc::new(FakeSandbox::new(id.clone()));
        self.sandboxes
            .lock()
            .unwrap()
            .insert(id, Arc::clone(&sandbox));
        sandbox
    }
}

#[async_trait]
impl SandboxBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create(&self, options: CreateOptions) -> Result<Arc<dyn Sandbox>> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SandboxError::CreationFailed("backend unreachable".into()));
        }
        *self.last_create.lock().unwrap() = Some(options);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.track(format!("sbx-{n}")))
    }

    async fn resume(&self, sandbox_id: &str, _timeout: Duration) -> Result<Arc<dyn Sandbox>> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if !self.resumable.lock().unwrap().contains(sandbox_id) {
            return Err(SandboxError::NotFound(sandbox_id.to_string()));
        }
        Ok(self.track(sandbox_id.to_string()))
    }

    async fn pause_detached(&self, sandbox_id: &str) -> Result<String> {
        self.detached_pauses.fetch_add(1, Ordering::SeqCst);
        if self.resumable.lock().unwrap().contains(sandbox_id) {
            return Err(SandboxError::Api {
                status: 409,
                body: "already paused".into(),
            });
        }
        Ok(format!("{sandbox_id}-paused"))
    }
}

pub fn manager(backend: &Arc<FakeBackend>, store: &Arc<MemoryStore>) -> SandboxManager {
    SandboxManager::new(backend.clone(), store.clone(), ManagerConfig::default())
}
