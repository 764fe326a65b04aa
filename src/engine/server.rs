// src/engine/server.rs

//! Server facade over the per-project integrator tasks.
//!
//! This is the surface remote collaborators (CLI, future dashboards) talk
//! to: force a build, cancel one, query status, reload configuration, shut
//! everything down. All of it translates into control events on the
//! projects' channels plus reads of the shared status map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::engine::queue::IntegrationQueue;
use crate::engine::{ControlEvent, IntegratorOptions, ProjectIntegrator};
use crate::errors::{BuildloopError, Result};
use crate::integration::IntegrationSummary;
use crate::state::StateStore;

/// Latest integration summary per project, shared with every integrator.
///
/// Written by each project when an integration finishes, read by dependency
/// triggers and status queries.
pub type StatusMap = Arc<RwLock<HashMap<String, IntegrationSummary>>>;

/// Buffered control events per project before senders start awaiting.
const CONTROL_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Run a single poll cycle per project and exit.
    pub once: bool,
    /// Restrict the server to one named project.
    pub only_project: Option<String>,
}

struct ProjectHandle {
    control_tx: mpsc::Sender<ControlEvent>,
    join: JoinHandle<()>,
}

/// Owns the integrator tasks and routes external requests to them.
pub struct BuildServer {
    handles: HashMap<String, ProjectHandle>,
    status: StatusMap,
    queue: Arc<IntegrationQueue>,
}

impl BuildServer {
    /// Spawn one integrator task per configured project.
    pub fn start(
        config: &ConfigFile,
        store: Arc<dyn StateStore>,
        options: ServerOptions,
    ) -> Result<Self> {
        let queue = Arc::new(IntegrationQueue::new());
        let status: StatusMap = Arc::new(RwLock::new(HashMap::new()));

        for (name, group) in &config.groups {
            queue.add_group(name, group.max_concurrent);
        }

        if let Some(only) = &options.only_project {
            if !config.projects.contains_key(only) {
                return Err(BuildloopError::UnknownProject(only.clone()));
            }
        }

        let mut handles = HashMap::new();
        for (name, project) in &config.projects {
            if let Some(only) = &options.only_project {
                if name != only {
                    continue;
                }
            }

            queue.register_project(name, project.queue_group.as_deref())?;

            let integrator = ProjectIntegrator::from_config(
                name,
                project.clone(),
                Arc::clone(&store),
                Arc::clone(&queue),
                Arc::clone(&status),
            )?;

            let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
            let integrator_options = IntegratorOptions {
                poll_interval: config.server.poll_interval(),
                exit_after_first_cycle: options.once,
            };
            let join = tokio::spawn(integrator.run(control_rx, integrator_options));

            handles.insert(
                name.clone(),
                ProjectHandle { control_tx, join },
            );
        }

        info!(projects = handles.len(), "build server started");

        Ok(Self {
            handles,
            status,
            queue,
        })
    }

    fn handle(&self, project: &str) -> Result<&ProjectHandle> {
        self.handles
            .get(project)
            .ok_or_else(|| BuildloopError::UnknownProject(project.to_string()))
    }

    /// Request an unconditional build of one project.
    pub async fn force_build(&self, project: &str, requested_by: &str) -> Result<()> {
        let handle = self.handle(project)?;
        info!(project = %project, requested_by = %requested_by, "force build requested");
        handle
            .control_tx
            .send(ControlEvent::ForceBuild {
                requested_by: requested_by.to_string(),
            })
            .await
            .map_err(|_| BuildloopError::UnknownProject(project.to_string()))
    }

    /// Request cancellation of a project's in-flight build, if any.
    pub async fn cancel_build(&self, project: &str) -> Result<()> {
        let handle = self.handle(project)?;
        info!(project = %project, "build cancellation requested");
        handle
            .control_tx
            .send(ControlEvent::CancelBuild)
            .await
            .map_err(|_| BuildloopError::UnknownProject(project.to_string()))
    }

    /// Snapshot of every project's latest integration summary.
    pub fn current_status(&self) -> HashMap<String, IntegrationSummary> {
        self.status
            .read()
            .map(|map| map.clone())
            .unwrap_or_default()
    }

    /// Latest summary for one project, if it has ever integrated.
    pub fn status_of(&self, project: &str) -> Result<Option<IntegrationSummary>> {
        if !self.handles.contains_key(project) {
            return Err(BuildloopError::UnknownProject(project.to_string()));
        }
        Ok(self
            .status
            .read()
            .ok()
            .and_then(|map| map.get(project).cloned()))
    }

    /// Whether the named project is currently executing a build.
    pub fn is_building(&self, project: &str) -> bool {
        self.queue.is_building(project)
    }

    /// Push re-validated configuration to the running projects.
    ///
    /// Existing projects pick up their new configuration at the next idle
    /// transition. Projects added to or removed from the file require a
    /// restart and are reported, not applied.
    pub async fn reload(&self, config: &ConfigFile) {
        for (name, project) in &config.projects {
            match self.handles.get(name) {
                Some(handle) => {
                    let event = ControlEvent::ConfigUpdated(Box::new(project.clone()));
                    if handle.control_tx.send(event).await.is_err() {
                        warn!(project = %name, "project loop gone; configuration not applied");
                    }
                }
                None => {
                    warn!(project = %name, "new project in configuration; restart required to add it");
                }
            }
        }

        for name in self.handles.keys() {
            if !config.projects.contains_key(name) {
                warn!(project = %name, "project removed from configuration; restart required to drop it");
            }
        }
    }

    /// Ask one project's loop to stop after its current cycle.
    pub async fn stop(&self, project: &str) -> Result<()> {
        let handle = self.handle(project)?;
        let _ = handle.control_tx.send(ControlEvent::Stop).await;
        Ok(())
    }

    /// Ask every project loop to stop. In-flight builds are cancelled.
    pub async fn stop_all(&self) {
        info!("stopping all project integrators");
        for (name, handle) in &self.handles {
            if handle.control_tx.send(ControlEvent::Stop).await.is_err() {
                warn!(project = %name, "project loop already gone");
            }
        }
    }

    /// Wait for every project loop to finish.
    pub async fn wait_all(self) {
        for (name, handle) in self.handles {
            if let Err(err) = handle.join.await {
                warn!(project = %name, error = %err, "project task ended abnormally");
            }
        }
        info!("all project integrators stopped");
    }
}
