// src/engine/queue.rs

//! Integration queue / concurrency gate.
//!
//! Enforces the core invariant: at most one integration per project is
//! executing at any instant. Requests for the same project queue FIFO, with
//! forced builds jumping ahead of polling-triggered requests (but never
//! ahead of an earlier forced request). Distinct projects run fully
//! concurrently unless they share a queue group, which caps the number of
//! concurrently building member projects.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::errors::{BuildloopError, Result};

/// Priority class of a build request in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPriority {
    Normal,
    Forced,
}

struct Waiter {
    seq: u64,
    priority: BuildPriority,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct Slot {
    busy: bool,
    group: Option<String>,
    waiters: Vec<Waiter>,
}

struct Group {
    limit: usize,
    active: usize,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    projects: HashMap<String, Slot>,
    groups: HashMap<String, Group>,
}

impl Inner {
    fn group_has_capacity(&self, project: &str) -> bool {
        let Some(slot) = self.projects.get(project) else {
            return false;
        };
        match slot.group.as_deref().and_then(|g| self.groups.get(g)) {
            Some(group) => group.active < group.limit,
            None => true,
        }
    }

    fn can_start(&self, project: &str) -> bool {
        match self.projects.get(project) {
            Some(slot) => !slot.busy && self.group_has_capacity(project),
            None => false,
        }
    }

    /// Mark the project as building and charge its group, if any.
    fn start(&mut self, project: &str) {
        let group = match self.projects.get_mut(project) {
            Some(slot) => {
                slot.busy = true;
                slot.group.clone()
            }
            None => return,
        };
        if let Some(group) = group.and_then(|g| self.groups.get_mut(&g)) {
            group.active += 1;
        }
    }

    fn finish(&mut self, project: &str) {
        let group = match self.projects.get_mut(project) {
            Some(slot) => {
                slot.busy = false;
                slot.group.clone()
            }
            None => return,
        };
        if let Some(group) = group.and_then(|g| self.groups.get_mut(&g)) {
            group.active = group.active.saturating_sub(1);
        }
    }

    /// Grant slots to eligible waiters until nothing more can start.
    ///
    /// Waiters whose receiver was dropped (cancelled requests) are discarded
    /// without side effects.
    fn pump(&mut self) {
        loop {
            let candidate = self
                .projects
                .iter()
                .filter(|(name, slot)| !slot.waiters.is_empty() && self.can_start(name))
                .map(|(name, _)| name.clone())
                .next();

            let Some(project) = candidate else { break };

            let waiter = match self.projects.get_mut(&project) {
                Some(slot) if !slot.waiters.is_empty() => slot.waiters.remove(0),
                _ => continue,
            };

            self.start(&project);
            if waiter.grant.send(()).is_err() {
                // Request was cancelled while queued; undo and keep pumping.
                debug!(project = %project, seq = waiter.seq, "discarding cancelled queue request");
                self.finish(&project);
            } else {
                debug!(project = %project, seq = waiter.seq, "granted queued build slot");
            }
        }
    }
}

/// Exclusive execution slot for one project's build.
///
/// Dropping the slot releases it, so release happens on success, failure
/// and fault alike.
pub struct QueueSlot<'a> {
    queue: &'a IntegrationQueue,
    project: String,
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.queue.release(&self.project);
    }
}

/// The gate serializing build execution per project and per queue group.
#[derive(Default)]
pub struct IntegrationQueue {
    inner: Mutex<Inner>,
}

impl IntegrationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a queue group with a bounded concurrent-build limit.
    pub fn add_group(&self, name: &str, max_concurrent: usize) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.groups.insert(
            name.to_string(),
            Group {
                limit: max_concurrent.max(1),
                active: 0,
            },
        );
    }

    /// Register a project and (optionally) its queue-group membership.
    ///
    /// Projects are also registered implicitly on first `acquire`, without
    /// group membership.
    pub fn register_project(&self, project: &str, group: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(group) = group {
            if !inner.groups.contains_key(group) {
                return Err(BuildloopError::ConfigError(format!(
                    "project '{project}' references unknown queue group '{group}'"
                )));
            }
        }
        let slot = inner.projects.entry(project.to_string()).or_default();
        slot.group = group.map(|g| g.to_string());
        Ok(())
    }

    /// Wait for the project's exclusive build slot.
    ///
    /// Resolution order for queued requests: forced before normal, FIFO
    /// within each class. Dropping the returned future while still queued
    /// cancels the request without side effects.
    pub async fn acquire(&self, project: &str, priority: BuildPriority) -> Result<QueueSlot<'_>> {
        let rx = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.projects.entry(project.to_string()).or_default();

            if inner.can_start(project) {
                inner.start(project);
                debug!(project = %project, ?priority, "acquired build slot immediately");
                return Ok(QueueSlot {
                    queue: self,
                    project: project.to_string(),
                });
            }

            inner.seq += 1;
            let seq = inner.seq;
            let (tx, rx) = oneshot::channel();

            if let Some(slot) = inner.projects.get_mut(project) {
                let waiter = Waiter {
                    seq,
                    priority,
                    grant: tx,
                };
                let pos = match priority {
                    // A forced build jumps queued normal requests but never
                    // an earlier forced one.
                    BuildPriority::Forced => slot
                        .waiters
                        .iter()
                        .position(|w| w.priority == BuildPriority::Normal)
                        .unwrap_or(slot.waiters.len()),
                    BuildPriority::Normal => slot.waiters.len(),
                };
                slot.waiters.insert(pos, waiter);
                debug!(project = %project, ?priority, seq, queued_at = pos, "queued build request");
            }

            rx
        };

        match rx.await {
            Ok(()) => Ok(QueueSlot {
                queue: self,
                project: project.to_string(),
            }),
            Err(_) => Err(BuildloopError::QueueViolation(format!(
                "queue dropped while '{project}' was waiting for its slot"
            ))),
        }
    }

    fn release(&self, project: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        match inner.projects.get_mut(project) {
            Some(slot) if slot.busy => {}
            _ => {
                // Releasing an unheld slot means the gate was bypassed
                // somewhere; this must never happen.
                error!(project = %project, "release of a slot that was never acquired");
                debug_assert!(false, "release of unheld queue slot for '{project}'");
                return;
            }
        }

        inner.finish(project);
        inner.pump();
    }

    /// Whether the project currently holds its build slot (test/diagnostic
    /// helper).
    pub fn is_building(&self, project: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.projects.get(project).map(|s| s.busy).unwrap_or(false)
    }
}
