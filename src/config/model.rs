// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::integration::IntegrationStatus;
use crate::triggers::TriggerOperator;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// state_dir = ".buildloop/state"
/// poll_interval_secs = 5
///
/// [group.heavy]
/// max_concurrent = 2
///
/// [project.api]
/// working_dir = "checkouts/api"
/// queue_group = "heavy"
///
/// [[project.api.trigger]]
/// kind = "interval"
/// interval_secs = 60
///
/// [[project.api.tasks]]
/// kind = "exec"
/// cmd = "make test"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Global daemon settings from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// Queue groups from `[group.<name>]`, keyed by group name.
    #[serde(default, rename = "group")]
    pub groups: BTreeMap<String, GroupSection>,

    /// All projects from `[project.<name>]`, keyed by project name.
    #[serde(default, rename = "project")]
    pub projects: BTreeMap<String, ProjectConfig>,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Directory holding the per-project persisted state records.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Seconds between trigger evaluations of each project.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl ServerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".buildloop/state")
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// `[group.<name>]` section: a named cap on concurrent builds.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSection {
    /// How many member projects may build at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for GroupSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// `[project.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Directory task commands run in.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Directory published build artifacts belong under.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Optional queue-group membership.
    #[serde(default)]
    pub queue_group: Option<String>,

    /// Source-control adapter configuration; defaults to the null adapter,
    /// which reports no modifications.
    #[serde(default)]
    pub source_control: ScmConfig,

    /// Triggers evaluated each poll; `[[project.<name>.trigger]]`.
    #[serde(default)]
    pub trigger: Vec<TriggerConfig>,

    /// Ordered build pipeline; `[[project.<name>.tasks]]`.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,

    /// Always-run stage executed after the pipeline regardless of outcome;
    /// `[[project.<name>.publishers]]`.
    #[serde(default)]
    pub publishers: Vec<TaskConfig>,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Source-control adapter configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScmConfig {
    /// No source control: modification checks always come back empty.
    #[default]
    Null,

    /// Query several adapters and merge their modification lists.
    Multi { sources: Vec<ScmConfig> },
}

/// One trigger entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TriggerConfig {
    /// Build-if-modified once at least `interval_secs` elapsed since the
    /// last completed check.
    Interval { interval_secs: u64 },

    /// Build unconditionally at a wall-clock time on given weekdays.
    Schedule {
        /// `"HH:MM"`, local to UTC.
        time: String,
        /// Weekday names, e.g. `["mon", "fri"]`. Empty means every day.
        #[serde(default)]
        days: Vec<String>,
    },

    /// Build when the named project completes a new successful integration.
    Project { project: String },

    /// Combine nested triggers with `"or"` or `"and"`.
    Multi {
        operator: TriggerOperator,
        triggers: Vec<TriggerConfig>,
    },
}

/// One pipeline task entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskConfig {
    /// Run a shell command in the build's working directory.
    Exec {
        #[serde(default)]
        name: Option<String>,
        cmd: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },

    /// Run nested tasks in order, stopping at the first failure.
    Sequence {
        #[serde(default)]
        name: Option<String>,
        tasks: Vec<TaskConfig>,
    },

    /// Run nested tasks only when the condition holds; otherwise succeed
    /// without running anything.
    Conditional {
        #[serde(default)]
        name: Option<String>,
        condition: ConditionConfig,
        tasks: Vec<TaskConfig>,
    },

    /// Run nested exec tasks concurrently; fails if any child fails.
    Parallel {
        #[serde(default)]
        name: Option<String>,
        tasks: Vec<TaskConfig>,
    },
}

/// Guard for a conditional task.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConditionConfig {
    /// True when both strings are equal.
    Compare { value1: String, value2: String },

    /// True when the current (or, with `previous = true`, the previous)
    /// integration has the given status.
    Status {
        status: IntegrationStatus,
        #[serde(default)]
        previous: bool,
    },
}
