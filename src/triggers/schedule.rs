// src/triggers/schedule.rs

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use tracing::debug;

use crate::triggers::{Trigger, TriggerContext, TriggerDecision};

/// Fires build-unconditionally at a configured time of day on configured
/// weekdays (empty weekday list means every day).
///
/// Idempotent within a day: the date of the last fire is tracked so polling
/// several times inside the scheduled minute cannot double-fire. A build
/// completing at or after the scheduled time also consumes that day's slot,
/// which is what keeps a coincident force request and a due schedule from
/// producing two builds.
#[derive(Debug)]
pub struct ScheduleTrigger {
    time: NaiveTime,
    days: Vec<Weekday>,
    last_fired: Option<NaiveDate>,
}

impl ScheduleTrigger {
    pub fn new(time: NaiveTime, days: Vec<Weekday>) -> Self {
        Self {
            time,
            days,
            last_fired: None,
        }
    }

    fn due(&self, now: DateTime<Utc>) -> bool {
        let day_matches = self.days.is_empty() || self.days.contains(&now.weekday());
        day_matches && now.time() >= self.time
    }
}

impl Trigger for ScheduleTrigger {
    fn peek(&self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        if self.last_fired == Some(ctx.now.date_naive()) {
            return TriggerDecision::NoBuild;
        }

        if self.due(ctx.now) {
            TriggerDecision::BuildNow
        } else {
            TriggerDecision::NoBuild
        }
    }

    fn fire(&mut self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        let decision = self.peek(ctx);
        if decision == TriggerDecision::BuildNow {
            self.last_fired = Some(ctx.now.date_naive());
            debug!(time = %self.time, "schedule trigger firing");
        }
        decision
    }

    fn integration_completed(&mut self, now: DateTime<Utc>) {
        // A build that finished past the scheduled time satisfies today's
        // slot, whatever caused it.
        if self.due(now) {
            self.last_fired = Some(now.date_naive());
        }
    }
}
