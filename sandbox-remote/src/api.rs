//! Wire types for the control and data plane.

use std::collections::BTreeMap;

use sandbox::{CellResult, CodeExecution, ExecutionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct NewSandbox<'a> {
    #[serde(rename = "templateID")]
    pub template_id: &'a str,
    /// Seconds.
    pub timeout: u64,
    pub metadata: &'a BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TimeoutBody {
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SandboxCreated {
    #[serde(rename = "sandboxID")]
    pub sandbox_id: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, rename = "envdAccessToken")]
    pub envd_access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SandboxDetail {
    pub state: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Paused {
    #[serde(default, rename = "sandboxID")]
    pub sandbox_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandBody<'a> {
    pub cmd: &'a str,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExecuteBody<'a> {
    pub code: &'a str,
}

/// One line of the interpreter's newline-delimited JSON stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ExecutionEvent {
    Stdout {
        text: String,
    },
    Stderr {
        text: String,
    },
    Result(CellResult),
    Error {
        name: String,
        value: String,
        #[serde(default)]
        traceback: String,
    },
    #[serde(other)]
    Other,
}

/// Fold an interpreter event stream into a single [`CodeExecution`].
///
/// Blank lines are skipped; malformed lines are reported as errors so a
/// truncated stream is not mistaken for a clean run.
pub(crate) fn fold_events(body: &str) -> Result<CodeExecution, serde_json::Error> {
    let mut execution = CodeExecution::default();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<ExecutionEvent>(line)? {
            ExecutionEvent::Stdout { text } => execution.stdout.push(text),
            ExecutionEvent::Stderr { text } => execution.stderr.push(text),
            ExecutionEvent::Result(result) => execution.results.push(result),
            ExecutionEvent::Error {
                name,
                value,
                traceback,
            } => {
                execution.error = Some(ExecutionError {
                    name,
                    value,
                    traceback,
                })
            }
            ExecutionEvent::Other => {}
        }
    }
    Ok(execution)
}
