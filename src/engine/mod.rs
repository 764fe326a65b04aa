// src/engine/mod.rs

//! Orchestration engine for buildloop.
//!
//! This module ties together:
//! - the per-project integrator state machine (poll → check → build → publish)
//! - the integration queue enforcing at-most-one-active-build per project
//! - the pending-request queue for force builds arriving mid-build
//! - the server facade exposed to remote/dashboard collaborators
//!
//! Each project is driven by an independent tokio task multiplexing a poll
//! ticker with a control channel; there is no global lock across projects
//! outside shared queue groups.

use std::time::Duration;

use crate::config::ProjectConfig;

pub mod integrator;
pub mod pending;
pub mod queue;
pub mod server;

pub use integrator::ProjectIntegrator;
pub use pending::{BuildRequest, PendingRequests};
pub use queue::{BuildPriority, IntegrationQueue, QueueSlot};
pub use server::{BuildServer, ServerOptions, StatusMap};

/// Control messages delivered to one project's integrator loop.
///
/// Sending one wakes that project's loop immediately, even mid-sleep.
#[derive(Debug)]
pub enum ControlEvent {
    /// Build now, bypassing triggers and the modification check.
    ForceBuild { requested_by: String },
    /// Cancel the in-flight build, if any.
    CancelBuild,
    /// Shut the project's loop down after the current cycle.
    Stop,
    /// Swap in a re-validated project configuration; takes effect at the
    /// next idle transition, never mid-build.
    ConfigUpdated(Box<ProjectConfig>),
}

/// Options for one project's integrator loop.
#[derive(Debug, Clone, Copy)]
pub struct IntegratorOptions {
    pub poll_interval: Duration,
    /// Exit the loop after the first poll cycle (used for `--once`).
    pub exit_after_first_cycle: bool,
}
