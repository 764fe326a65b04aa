// src/integration/mod.rs

//! Core build-attempt records: status, summaries and the mutable
//! [`IntegrationResult`] that a pipeline executes against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod result;

pub use result::{IntegrationResult, TaskResult};

/// Terminal (or not-yet-terminal) status of one integration.
///
/// Comparisons are equality-based; there is no ranking between statuses.
/// `Success` is the sentinel used for "last good build" bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    /// Build created but the pipeline has not reached a terminal state.
    Unknown,
    Success,
    Failure,
    /// An unexpected fault occurred while running the pipeline.
    Exception,
    /// The build was stopped by an administrative cancel request.
    Cancelled,
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntegrationStatus::Unknown => "unknown",
            IntegrationStatus::Success => "success",
            IntegrationStatus::Failure => "failure",
            IntegrationStatus::Exception => "exception",
            IntegrationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Lightweight immutable snapshot of one finished integration.
///
/// Used for trigger decisions, the previous-result pointer chain and the
/// status queries exposed to external reporting collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSummary {
    pub status: IntegrationStatus,
    pub label: u64,
    /// Label of the most recent result whose status was `Success`.
    ///
    /// Carried forward unchanged across non-success builds.
    pub last_successful_label: Option<u64>,
    pub start_time: DateTime<Utc>,
}

/// What caused a build to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildCause {
    /// Explicit force-build request from a remote client or the dashboard.
    Forced { requested_by: String },
    /// A schedule / dependency trigger resolved to build-unconditionally.
    Schedule,
    /// An interval trigger found source modifications in the poll window.
    Modifications,
}

impl BuildCause {
    /// Forced builds get queue priority over polling-triggered requests.
    pub fn is_forced(&self) -> bool {
        matches!(self, BuildCause::Forced { .. })
    }
}
