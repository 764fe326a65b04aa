// src/triggers/mod.rs

//! Trigger evaluation: decides whether a project should start integrating.
//!
//! Triggers are polled, never event-driven: the integrator asks every
//! trigger on each tick and combines the answers. Force-build requests are
//! not triggers; they arrive over the project's control channel and always
//! mean build-unconditionally.

use chrono::{DateTime, Utc};

use crate::engine::server::StatusMap;
use crate::integration::IntegrationSummary;

pub mod interval;
pub mod multi;
pub mod project;
pub mod schedule;

pub use interval::IntervalTrigger;
pub use multi::{MultiTrigger, TriggerOperator};
pub use project::ProjectTrigger;
pub use schedule::ScheduleTrigger;

/// Outcome of evaluating a trigger at one poll tick.
///
/// The derived ordering is the dominance order used when combining
/// decisions: build-unconditionally > build-if-modified > no-build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TriggerDecision {
    NoBuild,
    BuildIfModified,
    BuildNow,
}

impl TriggerDecision {
    /// Combine two decisions, keeping the strongest.
    pub fn strongest(self, other: TriggerDecision) -> TriggerDecision {
        self.max(other)
    }
}

/// Everything a trigger may look at when deciding.
pub struct TriggerContext<'a> {
    pub now: DateTime<Utc>,
    pub last_build: Option<&'a IntegrationSummary>,
    /// Latest summaries of all projects, for dependency triggers.
    pub peers: &'a StatusMap,
}

/// Policy deciding when an integration should start.
pub trait Trigger: Send + Sync {
    /// Evaluate without changing trigger state.
    fn peek(&self, ctx: &TriggerContext<'_>) -> TriggerDecision;

    /// Evaluate and commit. A non-no-build return may update internal
    /// bookkeeping (a spent schedule slot, a seen peer label) so the same
    /// occurrence is not reported twice. Composites call this on their
    /// sub-triggers only when the combined decision is acted on.
    fn fire(&mut self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        self.peek(ctx)
    }

    /// Bookkeeping hook invoked after a completed check cycle (an empty
    /// modification check or a finished build). Not invoked after an
    /// inconclusive source-control failure, so the window is retried.
    fn integration_completed(&mut self, _now: DateTime<Utc>) {}
}

/// Build the trigger list from validated configuration.
pub fn from_config(
    cfgs: &[crate::config::TriggerConfig],
) -> crate::errors::Result<Vec<Box<dyn Trigger>>> {
    cfgs.iter().map(build_trigger).collect()
}

fn build_trigger(cfg: &crate::config::TriggerConfig) -> crate::errors::Result<Box<dyn Trigger>> {
    use crate::config::TriggerConfig;

    let trigger: Box<dyn Trigger> = match cfg {
        TriggerConfig::Interval { interval_secs } => Box::new(IntervalTrigger::new(
            chrono::Duration::seconds(*interval_secs as i64),
        )),
        TriggerConfig::Schedule { time, days } => {
            // Already checked during config validation.
            let time = crate::config::parse_schedule_time(time)
                .map_err(crate::errors::BuildloopError::ConfigError)?;
            let days = crate::config::parse_schedule_days(days)
                .map_err(crate::errors::BuildloopError::ConfigError)?;
            Box::new(ScheduleTrigger::new(time, days))
        }
        TriggerConfig::Project { project } => Box::new(ProjectTrigger::new(project.clone())),
        TriggerConfig::Multi { operator, triggers } => {
            let inner = from_config(triggers)?;
            Box::new(MultiTrigger::new(*operator, inner))
        }
    };

    Ok(trigger)
}
