#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use buildloop::config::{
    ConfigFile, GroupSection, ProjectConfig, ScmConfig, ServerSection, TaskConfig, TriggerConfig,
};
use buildloop::integration::{
    BuildCause, IntegrationResult, IntegrationStatus, IntegrationSummary,
};
use buildloop::scm::{ChangeType, Modification};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: ConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigFile {
                server: ServerSection::default(),
                groups: BTreeMap::new(),
                projects: BTreeMap::new(),
            },
        }
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.server.state_dir = dir.into();
        self
    }

    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.server.poll_interval_secs = secs;
        self
    }

    pub fn with_group(mut self, name: &str, max_concurrent: usize) -> Self {
        self.config
            .groups
            .insert(name.to_string(), GroupSection { max_concurrent });
        self
    }

    pub fn with_project(mut self, name: &str, project: ProjectConfig) -> Self {
        self.config.projects.insert(name.to_string(), project);
        self
    }

    pub fn build(self) -> ConfigFile {
        buildloop::config::validate_config(&self.config)
            .expect("Failed to build valid config from builder");
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProjectConfig`.
pub struct ProjectConfigBuilder {
    project: ProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new() -> Self {
        Self {
            project: ProjectConfig {
                working_dir: PathBuf::from("."),
                artifact_dir: PathBuf::from("artifacts"),
                queue_group: None,
                source_control: ScmConfig::Null,
                trigger: vec![],
                tasks: vec![],
                publishers: vec![],
            },
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project.working_dir = dir.into();
        self
    }

    pub fn queue_group(mut self, group: &str) -> Self {
        self.project.queue_group = Some(group.to_string());
        self
    }

    pub fn interval_trigger(mut self, interval_secs: u64) -> Self {
        self.project.trigger.push(TriggerConfig::Interval { interval_secs });
        self
    }

    pub fn project_trigger(mut self, project: &str) -> Self {
        self.project.trigger.push(TriggerConfig::Project {
            project: project.to_string(),
        });
        self
    }

    pub fn exec_task(mut self, name: &str, cmd: &str) -> Self {
        self.project.tasks.push(TaskConfig::Exec {
            name: Some(name.to_string()),
            cmd: cmd.to_string(),
            timeout_secs: None,
        });
        self
    }

    pub fn exec_publisher(mut self, name: &str, cmd: &str) -> Self {
        self.project.publishers.push(TaskConfig::Exec {
            name: Some(name.to_string()),
            cmd: cmd.to_string(),
            timeout_secs: None,
        });
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.project
    }
}

impl Default for ProjectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal modification record for trigger/window tests.
pub fn modification(file: &str, user: &str, at: DateTime<Utc>) -> Modification {
    Modification {
        file_name: file.to_string(),
        folder_name: String::new(),
        modified_time: at,
        user_name: user.to_string(),
        comment: String::new(),
        change_type: ChangeType::Modified,
        version: String::new(),
        url: None,
    }
}

/// A summary as the status map would hold it.
pub fn summary(label: u64, status: IntegrationStatus, at: DateTime<Utc>) -> IntegrationSummary {
    IntegrationSummary {
        status,
        label,
        last_successful_label: if status == IntegrationStatus::Success {
            Some(label)
        } else {
            None
        },
        start_time: at,
    }
}

/// A fresh in-progress result for pipeline tests.
pub fn integration_result(project: &str, label: u64) -> IntegrationResult {
    IntegrationResult::new(
        project,
        label,
        PathBuf::from("."),
        PathBuf::from("artifacts"),
        Utc::now(),
        BuildCause::Schedule,
        Vec::new(),
        None,
    )
}
