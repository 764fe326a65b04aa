// src/triggers/multi.rs

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::triggers::{Trigger, TriggerContext, TriggerDecision};

/// How a [`MultiTrigger`] combines its sub-triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOperator {
    /// Strongest decision of any sub-trigger wins.
    Or,
    /// All sub-triggers must want a build; the strongest decision then wins.
    And,
}

/// Composite trigger over an ordered list of sub-triggers.
pub struct MultiTrigger {
    operator: TriggerOperator,
    triggers: Vec<Box<dyn Trigger>>,
}

impl MultiTrigger {
    pub fn new(operator: TriggerOperator, triggers: Vec<Box<dyn Trigger>>) -> Self {
        Self { operator, triggers }
    }
}

impl Trigger for MultiTrigger {
    fn peek(&self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        let mut strongest = TriggerDecision::NoBuild;
        let mut all_fired = true;

        for trigger in &self.triggers {
            let decision = trigger.peek(ctx);
            if decision == TriggerDecision::NoBuild {
                all_fired = false;
            }
            strongest = strongest.strongest(decision);
        }

        match self.operator {
            TriggerOperator::Or => strongest,
            TriggerOperator::And => {
                if all_fired {
                    strongest
                } else {
                    TriggerDecision::NoBuild
                }
            }
        }
    }

    fn fire(&mut self, ctx: &TriggerContext<'_>) -> TriggerDecision {
        let decision = self.peek(ctx);

        // Sub-trigger state is committed only when the combined decision
        // results in a build; a suppressed conjunction leaves it untouched.
        if decision != TriggerDecision::NoBuild {
            for trigger in &mut self.triggers {
                trigger.fire(ctx);
            }
        }
        decision
    }

    fn integration_completed(&mut self, now: DateTime<Utc>) {
        for trigger in &mut self.triggers {
            trigger.integration_completed(now);
        }
    }
}
