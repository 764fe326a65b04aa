// src/scm/modification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change a modification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
    /// A whole-changeset record for systems that report atomic commits.
    ChangeSet,
}

/// Normalized description of a single detected source change.
///
/// Immutable once produced by a source-control adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub file_name: String,
    pub folder_name: String,
    pub modified_time: DateTime<Utc>,
    pub user_name: String,
    pub comment: String,
    pub change_type: ChangeType,
    pub version: String,
    #[serde(default)]
    pub url: Option<String>,
}
