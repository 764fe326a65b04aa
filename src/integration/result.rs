// src/integration/result.rs

//! The mutable record of one build attempt.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::integration::{BuildCause, IntegrationStatus, IntegrationSummary};
use crate::scm::Modification;

/// Output of a single executed task, kept in declared order on the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub name: String,
    pub success: bool,
    pub output: String,
}

/// The record of one integration attempt.
///
/// Created by the project integrator right before the pipeline starts,
/// mutated only by the pipeline that owns the build, and treated as an
/// immutable snapshot once `status` reaches a terminal value.
#[derive(Debug, Clone)]
pub struct IntegrationResult {
    pub project: String,
    /// Unique, per-project monotonically increasing build identifier.
    pub label: u64,
    pub status: IntegrationStatus,
    pub working_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub start_time: DateTime<Utc>,
    pub cause: BuildCause,
    /// Modifications that triggered this build (empty for forced/scheduled
    /// builds, which bypass the modification check).
    pub modifications: Vec<Modification>,
    pub task_results: Vec<TaskResult>,
    /// Diagnostic attached when a task raised an unexpected fault.
    pub fault: Option<String>,
    /// Summary of the previous integration of this project, if any.
    pub last_integration: Option<IntegrationSummary>,
}

impl IntegrationResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: impl Into<String>,
        label: u64,
        working_dir: PathBuf,
        artifact_dir: PathBuf,
        start_time: DateTime<Utc>,
        cause: BuildCause,
        modifications: Vec<Modification>,
        last_integration: Option<IntegrationSummary>,
    ) -> Self {
        Self {
            project: project.into(),
            label,
            status: IntegrationStatus::Unknown,
            working_dir,
            artifact_dir,
            start_time,
            cause,
            modifications,
            task_results: Vec::new(),
            fault: None,
            last_integration,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == IntegrationStatus::Success
    }

    /// Status of the previous integration, if there was one.
    pub fn previous_status(&self) -> IntegrationStatus {
        self.last_integration
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(IntegrationStatus::Unknown)
    }

    /// Immutable summary of this result.
    ///
    /// `last_successful_label` points at this build when it succeeded and is
    /// otherwise carried forward from the previous integration.
    pub fn summary(&self) -> IntegrationSummary {
        let last_successful_label = if self.succeeded() {
            Some(self.label)
        } else {
            self.last_integration
                .as_ref()
                .and_then(|s| s.last_successful_label)
        };

        IntegrationSummary {
            status: self.status,
            label: self.label,
            last_successful_label,
            start_time: self.start_time,
        }
    }
}
