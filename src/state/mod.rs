// src/state/mod.rs

//! Durable per-project state: the record that lets scheduling and
//! "has it ever built" queries survive a process restart.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::integration::{IntegrationResult, IntegrationStatus, IntegrationSummary};

pub mod store;

pub use store::{FileStateStore, MemoryStateStore};

/// Persisted form of a project's last integration.
///
/// One record per project, keyed by project name. Created on first save,
/// overwritten on every subsequent build completion, never deleted by the
/// core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project: String,
    pub label: u64,
    pub status: IntegrationStatus,
    pub last_successful_label: Option<u64>,
    pub start_time: DateTime<Utc>,
    pub working_dir: PathBuf,
    pub artifact_dir: PathBuf,
}

impl ProjectState {
    pub fn from_result(result: &IntegrationResult) -> Self {
        let summary = result.summary();
        Self {
            project: result.project.clone(),
            label: summary.label,
            status: summary.status,
            last_successful_label: summary.last_successful_label,
            start_time: summary.start_time,
            working_dir: result.working_dir.clone(),
            artifact_dir: result.artifact_dir.clone(),
        }
    }

    pub fn summary(&self) -> IntegrationSummary {
        IntegrationSummary {
            status: self.status,
            label: self.label,
            last_successful_label: self.last_successful_label,
            start_time: self.start_time,
        }
    }
}

/// Abstract storage for per-project state records.
///
/// Implementations must serialize concurrent saves for the same project and
/// must be crash-atomic: a crash mid-save leaves either the old or the new
/// record readable, never a corrupt partial one.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` means "never built" (missing record). A record that exists
    /// but fails structural parsing is a fatal error, not `None`.
    fn load<'a>(
        &'a self,
        project: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProjectState>>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        project: &'a str,
        state: &'a ProjectState,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
