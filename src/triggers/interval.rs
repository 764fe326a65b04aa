// src/triggers/interval.rs

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::triggers::{Trigger, TriggerContext, TriggerDecision};

/// Fires build-if-modified once per configured interval.
///
/// The interval is measured from the last completed check cycle; before the
/// first cycle it falls back to the last build's start time, and a project
/// that has never built at all is due immediately.
#[derive(Debug)]
pub struct IntervalTrigger {
    interval: Duration,
    last_completed: Option<DateTime<Utc>>,
}

impl IntervalTrigger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: None,
        }
    }
}

impl Trigger for IntervalTrigger {
    fn peek(&self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        let base = self
            .last_completed
            .or_else(|| ctx.last_build.map(|s| s.start_time));

        match base {
            None => TriggerDecision::BuildIfModified,
            Some(base) => {
                if ctx.now - base >= self.interval {
                    debug!(elapsed = %(ctx.now - base), "interval elapsed");
                    TriggerDecision::BuildIfModified
                } else {
                    TriggerDecision::NoBuild
                }
            }
        }
    }

    fn integration_completed(&mut self, now: DateTime<Utc>) {
        self.last_completed = Some(now);
    }
}
