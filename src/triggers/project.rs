// src/triggers/project.rs

use tracing::debug;

use crate::integration::IntegrationStatus;
use crate::triggers::{Trigger, TriggerContext, TriggerDecision};

/// Dependency trigger: builds when a named peer project completes a new
/// successful integration.
#[derive(Debug)]
pub struct ProjectTrigger {
    project: String,
    last_seen_label: Option<u64>,
}

impl ProjectTrigger {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            last_seen_label: None,
        }
    }

    /// Decision plus the peer label to mark as seen when committing.
    fn decide(&self, ctx: &TriggerContext<'_>) -> (TriggerDecision, Option<u64>) {
        let peers = match ctx.peers.read() {
            Ok(guard) => guard,
            Err(_) => return (TriggerDecision::NoBuild, None),
        };

        let Some(peer) = peers.get(&self.project) else {
            return (TriggerDecision::NoBuild, None);
        };

        if peer.status != IntegrationStatus::Success {
            return (TriggerDecision::NoBuild, None);
        }

        if self.last_seen_label == Some(peer.label) {
            return (TriggerDecision::NoBuild, None);
        }

        // Don't re-trigger off a success that predates our own last build.
        if let Some(last) = ctx.last_build {
            if peer.start_time <= last.start_time {
                return (TriggerDecision::NoBuild, Some(peer.label));
            }
        }

        (TriggerDecision::BuildNow, Some(peer.label))
    }
}

impl Trigger for ProjectTrigger {
    fn peek(&self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        self.decide(ctx).0
    }

    fn fire(&mut self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        let (decision, seen) = self.decide(ctx);
        if let Some(label) = seen {
            self.last_seen_label = Some(label);
            if decision == TriggerDecision::BuildNow {
                debug!(
                    dependency = %self.project,
                    label,
                    "dependency project succeeded; triggering build"
                );
            }
        }
        decision
    }
}
