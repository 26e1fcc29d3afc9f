//! Remote sandbox backend.
//!
//! Talks to a hosted sandbox service over HTTP. The control plane
//! (`{api_url}/sandboxes/...`) creates, resumes, pauses and deletes sandboxes;
//! the data plane (`https://{port}-{sandbox_id}.{domain}`) is served by the
//! daemon running inside each sandbox and handles files, commands and code.

mod api;
mod backend;
mod client;
mod config;
mod handle;

pub use backend::RemoteBackend;
pub use config::{CODE_INTERPRETER_PORT, DEFAULT_REQUEST_TIMEOUT, ENVD_PORT, RemoteConfig};
pub use handle::RemoteSandbox;
