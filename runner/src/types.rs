use sandbox::{CellResult, ExecutionError};
use serde::{Deserialize, Serialize};

/// Template whose fragments run through the code interpreter instead of
/// being served over HTTP.
pub const CODE_INTERPRETER_TEMPLATE: &str = "code-interpreter-v1";

/// Generated code plus the metadata needed to run it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub commentary: String,
    pub template: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub additional_dependencies: Vec<String>,
    #[serde(default)]
    pub has_additional_dependencies: bool,
    #[serde(default)]
    pub install_dependencies_command: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub file_path: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Execute,
    Pause,
    Resume,
}

/// Body of `POST /api/projects/:project_id/sandbox`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRequest {
    #[serde(default)]
    pub fragment: Option<Fragment>,
    #[serde(default)]
    pub operation: Option<Operation>,
    /// Template for `resume` requests that carry no fragment.
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default, rename = "userID")]
    pub user_id: Option<String>,
    #[serde(default, rename = "teamID")]
    pub team_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpreterResult {
    pub sbx_id: String,
    pub template: String,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub runtime_error: Option<ExecutionError>,
    pub cell_results: Vec<CellResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebResult {
    pub sbx_id: String,
    pub template: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExecutionResult {
    Interpreter(InterpreterResult),
    Web(WebResult),
}

impl ExecutionResult {
    pub fn sandbox_id(&self) -> &str {
        match self {
            Self::Interpreter(r) => &r.sbx_id,
            Self::Web(r) => &r.sbx_id,
        }
    }
}
