//! Lifecycle management for per-project sandboxes.
//!
//! A project owns at most one logical sandbox. Three sources of truth can
//! disagree about it: the in-process [`SandboxRegistry`], the durable
//! `sandbox_id` kept by a [`ProjectStore`], and the backend itself. The
//! [`SandboxManager`] reconciles them lazily: cached handle first, then a
//! resume of the stored id, then a fresh sandbox.

mod error;
mod maintenance;
mod manager;
mod memory;
mod outcome;
mod registry;
mod store;

pub use error::{ManagerError, ManagerResult};
pub use maintenance::SweepReport;
pub use manager::{AcquireRequest, ManagerConfig, SandboxManager, TEAM_HEADER, TEAM_TOKEN_HEADER};
pub use memory::{MemoryStore, ProjectRecord};
pub use outcome::{AcquireSource, Acquired, Outcome, SoftFailure};
pub use registry::{ProjectGuard, ProjectLocks, SandboxRegistry};
pub use store::{Credentials, InactiveProject, ProjectStore, StoreError, StoreResult};
