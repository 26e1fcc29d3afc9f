use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub struct CommandRequest<'a> {
    pub cmd: &'a str,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runtime error raised by interpreted code (not a transport failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub traceback: String,
}

/// One rendered output of a code cell, keyed by format (`text`, `png`, `html`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellResult {
    #[serde(flatten)]
    pub formats: BTreeMap<String, serde_json::Value>,
    #[serde(default, rename = "is_main_result")]
    pub is_main_result: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeExecution {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub error: Option<ExecutionError>,
    pub results: Vec<CellResult>,
}

impl CodeExecution {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
