use std::time::Duration;

use chrono::Utc;
use sandbox::{CommandRequest, Sandbox};
use sandbox_manager::{AcquireRequest, Credentials, ProjectStore, SandboxManager};
use tracing::{info, warn};

use crate::error::RunnerResult;
use crate::types::{
    CODE_INTERPRETER_TEMPLATE, ExecutionResult, Fragment, InterpreterResult, WebResult,
};

/// Dependency installs can pull large package trees.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
/// Port served when the fragment does not name one.
const DEFAULT_WEB_PORT: u16 = 80;

pub struct ExecuteRequest {
    pub fragment: Fragment,
    pub team_id: Option<String>,
    pub credentials: Option<Credentials>,
}

/// Run a fragment in the project's sandbox.
///
/// Acquires the sandbox (cache, resume or create), installs extra
/// dependencies, writes the code and then either runs it through the
/// interpreter or returns the URL the sandbox serves it on.
pub async fn execute(
    manager: &SandboxManager,
    store: &dyn ProjectStore,
    project_id: &str,
    request: ExecuteRequest,
) -> RunnerResult<ExecutionResult> {
    let ExecuteRequest {
        fragment,
        team_id,
        credentials,
    } = request;

    let mut acquire = AcquireRequest::new(project_id, fragment.template.as_str());
    if let Some(team_id) = team_id {
        acquire = acquire.with_team(team_id);
    }
    if let Some(creds) = credentials.clone() {
        acquire = acquire.with_credentials(creds);
    }

    let acquired = manager.get_or_create(&acquire).await?;
    for failure in acquired.outcome.soft_failures() {
        warn!(project_id = %project_id, failure = %failure, "sandbox acquired with soft failure");
    }
    let sandbox = acquired.handle;

    if fragment.has_additional_dependencies {
        install_dependencies(sandbox.as_ref(), &fragment).await?;
    }

    sandbox
        .write_file(&fragment.file_path, fragment.code.as_bytes())
        .await?;
    info!(
        project_id = %project_id,
        sandbox_id = %sandbox.id(),
        file = %fragment.file_path,
        "updated file"
    );

    if let Err(e) = store
        .touch(project_id, Utc::now(), credentials.as_ref())
        .await
    {
        warn!(project_id = %project_id, error = %e, "failed to record project activity");
    }

    if fragment.template == CODE_INTERPRETER_TEMPLATE {
        let execution = sandbox.run_code(&fragment.code).await?;
        if let Some(err) = &execution.error {
            info!(sandbox_id = %sandbox.id(), error = %err.name, "code raised a runtime error");
        }
        return Ok(ExecutionResult::Interpreter(InterpreterResult {
            sbx_id: sandbox.id().to_string(),
            template: fragment.template,
            stdout: execution.stdout,
            stderr: execution.stderr,
            runtime_error: execution.error,
            cell_results: execution.results,
        }));
    }

    let port = fragment.port.unwrap_or(DEFAULT_WEB_PORT);
    Ok(ExecutionResult::Web(WebResult {
        sbx_id: sandbox.id().to_string(),
        url: format!("https://{}", sandbox.host(port)),
        template: fragment.template,
    }))
}

async fn install_dependencies(sandbox: &dyn Sandbox, fragment: &Fragment) -> RunnerResult<()> {
    let output = sandbox
        .run_command(&CommandRequest {
            cmd: &fragment.install_dependencies_command,
            timeout: INSTALL_TIMEOUT,
        })
        .await?;

    if output.exit_code != 0 {
        warn!(
            sandbox_id = %sandbox.id(),
            exit_code = output.exit_code,
            stderr = %output.stderr.trim_end(),
            "dependency install exited non-zero"
        );
    } else {
        info!(
            sandbox_id = %sandbox.id(),
            dependencies = %fragment.additional_dependencies.join(", "),
            "installed dependencies"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sandbox::{CellResult, CodeExecution, ExecutionError};
    use sandbox_manager::{AcquireSource, ManagerConfig, MemoryStore};

    use super::*;
    use crate::testing::FakeBackend;

    fn setup() -> (Arc<FakeBackend>, Arc<MemoryStore>, SandboxManager) {
        let backend = FakeBackend::new();
        let store = Arc::new(MemoryStore::new());
        store.insert_project("p1", "Project", None);
        let manager = SandboxManager::new(backend.clone(), store.clone(), ManagerConfig::default());
        (backend, store, manager)
    }

    fn web_fragment() -> Fragment {
        Fragment {
            template: "nextjs-developer".into(),
            file_path: "pages/index.tsx".into(),
            code: "export default () => null".into(),
            port: Some(3000),
            ..Fragment::default()
        }
    }

    fn request(fragment: Fragment) -> ExecuteRequest {
        ExecuteRequest {
            fragment,
            team_id: None,
            credentials: None,
        }
    }

    #[tokio::test]
    async fn web_fragment_returns_url() {
        let (backend, store, manager) = setup();

        let result = execute(&manager, store.as_ref(), "p1", request(web_fragment()))
            .await
            .unwrap();

        let ExecutionResult::Web(web) = result else {
            panic!("expected web result");
        };
        assert_eq!(web.sbx_id, "sbx-1");
        assert_eq!(web.url, "https://3000-sbx-1.test");
        let sandbox = backend.sandbox("sbx-1").unwrap();
        assert_eq!(
            sandbox.files(),
            vec![("pages/index.tsx".to_string(), b"export default () => null".to_vec())]
        );
        assert!(sandbox.commands().is_empty());
        // sandbox id write on create, then the activity touch
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn web_fragment_without_port_uses_80() {
        let (_backend, store, manager) = setup();
        let fragment = Fragment {
            port: None,
            ..web_fragment()
        };

        let result = execute(&manager, store.as_ref(), "p1", request(fragment))
            .await
            .unwrap();
        let ExecutionResult::Web(web) = result else {
            panic!("expected web result");
        };
        assert_eq!(web.url, "https://80-sbx-1.test");
    }

    #[tokio::test]
    async fn interpreter_fragment_runs_code() {
        let (backend, store, manager) = setup();
        backend.set_code_result(CodeExecution {
            stdout: vec!["2\n".into()],
            stderr: vec![],
            error: Some(ExecutionError {
                name: "ZeroDivisionError".into(),
                value: "division by zero".into(),
                traceback: String::new(),
            }),
            results: vec![CellResult::default()],
        });
        let fragment = Fragment {
            template: CODE_INTERPRETER_TEMPLATE.into(),
            file_path: "script.py".into(),
            code: "print(1 + 1)\n1 / 0".into(),
            ..Fragment::default()
        };

        let result = execute(&manager, store.as_ref(), "p1", request(fragment))
            .await
            .unwrap();

        let ExecutionResult::Interpreter(out) = result else {
            panic!("expected interpreter result");
        };
        assert_eq!(out.stdout, vec!["2\n".to_string()]);
        assert_eq!(out.runtime_error.unwrap().name, "ZeroDivisionError");
        assert_eq!(out.cell_results.len(), 1);
        assert_eq!(
            backend.sandbox("sbx-1").unwrap().code_runs(),
            vec!["print(1 + 1)\n1 / 0".to_string()]
        );
    }

    #[tokio::test]
    async fn installs_dependencies_before_writing() {
        let (backend, store, manager) = setup();
        backend.set_command_exit_code(1);
        let fragment = Fragment {
            has_additional_dependencies: true,
            additional_dependencies: vec!["lodash".into()],
            install_dependencies_command: "npm install lodash".into(),
            ..web_fragment()
        };

        execute(&manager, store.as_ref(), "p1", request(fragment))
            .await
            .unwrap();

        let sandbox = backend.sandbox("sbx-1").unwrap();
        assert_eq!(sandbox.commands(), vec!["npm install lodash".to_string()]);
        assert_eq!(sandbox.files().len(), 1);
    }

    #[tokio::test]
    async fn second_execute_reuses_cached_sandbox() {
        let (backend, store, manager) = setup();

        execute(&manager, store.as_ref(), "p1", request(web_fragment()))
            .await
            .unwrap();
        let again = execute(&manager, store.as_ref(), "p1", request(web_fragment()))
            .await
            .unwrap();

        assert_eq!(again.sandbox_id(), "sbx-1");
        assert_eq!(backend.creates(), 1);
        let acquired = manager
            .get_or_create(&AcquireRequest::new("p1", "nextjs-developer"))
            .await
            .unwrap();
        assert_eq!(acquired.source, AcquireSource::Cached);
    }

    #[tokio::test]
    async fn touch_failure_does_not_fail_execution() {
        let (_backend, store, manager) = setup();
        store.set_fail_writes(true);
        let result = execute(&manager, store.as_ref(), "p1", request(web_fragment())).await;
        assert!(result.is_ok());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn create_failure_is_surfaced() {
        let (backend, store, manager) = setup();
        backend.set_fail_create(true);

        let err = execute(&manager, store.as_ref(), "p1", request(web_fragment()))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::RunnerError::Manager(_)), "got: {err}");
    }
}
