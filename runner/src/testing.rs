//! In-process backend for runner tests.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sandbox::{
    CodeExecution, CommandOutput, CommandRequest, CreateOptions, Result, Sandbox, SandboxBackend,
    SandboxError,
};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FakeSandbox {
    id: String,
    live: AtomicBool,
    command_exit: i32,
    code_result: CodeExecution,
    files: Mutex<Vec<(String, Vec<u8>)>>,
    commands: Mutex<Vec<String>>,
    code_runs: Mutex<Vec<String>>,
    pub kills: AtomicUsize,
}

impl FakeSandbox {
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        locked(&self.files).clone()
    }

    pub fn commands(&self) -> Vec<String> {
        locked(&self.commands).clone()
    }

    pub fn code_runs(&self) -> Vec<String> {
        locked(&self.code_runs).clone()
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn host(&self, port: u16) -> String {
        format!("{port}-{}.test", self.id)
    }

    async fn is_live(&self) -> Result<bool> {
        Ok(self.live.load(Ordering::SeqCst))
    }

    async fn set_timeout(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn pause(&self) -> Result<String> {
        self.live.store(false, Ordering::SeqCst);
        Ok(self.id.clone())
    }

    async fn kill(&self) -> Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        locked(&self.files).push((path.to_string(), content.to_vec()));
        Ok(())
    }

    async fn run_command(&self, request: &CommandRequest<'_>) -> Result<CommandOutput> {
        locked(&self.commands).push(request.cmd.to_string());
        Ok(CommandOutput {
            exit_code: self.command_exit,
            ..CommandOutput::default()
        })
    }

    async fn run_code(&self, code: &str) -> Result<CodeExecution> {
        locked(&self.code_runs).push(code.to_string());
        Ok(self.code_result.clone())
    }
}

/// Hands out `sbx-N` sandboxes. Resume always reports the id as gone.
#[derive(Default)]
pub struct FakeBackend {
    fail_create: AtomicBool,
    command_exit: AtomicI32,
    code_result: Mutex<CodeExecution>,
    sandboxes: Mutex<Vec<Arc<FakeSandbox>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_command_exit_code(&self, code: i32) {
        self.command_exit.store(code, Ordering::SeqCst);
    }

    pub fn set_code_result(&self, result: CodeExecution) {
        *locked(&self.code_result) = result;
    }

    pub fn creates(&self) -> usize {
        locked(&self.sandboxes).len()
    }

    pub fn sandbox(&self, id: &str) -> Option<Arc<FakeSandbox>> {
        locked(&self.sandboxes).iter().find(|s| s.id == id).cloned()
    }
}

#[async_trait]
impl SandboxBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create(&self, options: CreateOptions) -> Result<Arc<dyn Sandbox>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SandboxError::CreationFailed(format!(
                "template {} unavailable",
                options.template_id
            )));
        }
        let mut sandboxes = locked(&self.sandboxes);
        let sandbox = Arc::new(FakeSandbox {
            id: format!("sbx-{}", sandboxes.len() + 1),
            live: AtomicBool::new(true),
            command_exit: self.command_exit.load(Ordering::SeqCst),
            code_result: locked(&self.code_result).clone(),
            files: Mutex::default(),
            commands: Mutex::default(),
            code_runs: Mutex::default(),
            kills: AtomicUsize::new(0),
        });
        sandboxes.push(sandbox.clone());
        Ok(sandbox)
    }

    async fn resume(&self, sandbox_id: &str, _timeout: Duration) -> Result<Arc<dyn Sandbox>> {
        Err(SandboxError::NotFound(sandbox_id.to_string()))
    }

    async fn pause_detached(&self, sandbox_id: &str) -> Result<String> {
        Ok(sandbox_id.to_string())
    }
}
