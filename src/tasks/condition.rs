// src/tasks/condition.rs

//! Conditions guarding conditional tasks.

use crate::integration::{IntegrationResult, IntegrationStatus};

/// Pure predicate over the result-so-far plus condition-supplied literals.
///
/// Must not mutate the result.
pub trait Condition: Send + Sync {
    fn evaluate(&self, result: &IntegrationResult) -> bool;
}

/// Compares two configured literal values for equality.
#[derive(Debug, Clone)]
pub struct CompareCondition {
    value1: String,
    value2: String,
}

impl CompareCondition {
    pub fn new(value1: impl Into<String>, value2: impl Into<String>) -> Self {
        Self {
            value1: value1.into(),
            value2: value2.into(),
        }
    }
}

impl Condition for CompareCondition {
    fn evaluate(&self, _result: &IntegrationResult) -> bool {
        self.value1 == self.value2
    }
}

/// Compares an [`IntegrationStatus`] literal against the current result's
/// status, or against the previous integration's status.
#[derive(Debug, Clone)]
pub struct StatusCondition {
    status: IntegrationStatus,
    previous: bool,
}

impl StatusCondition {
    pub fn new(status: IntegrationStatus, previous: bool) -> Self {
        Self { status, previous }
    }
}

impl Condition for StatusCondition {
    fn evaluate(&self, result: &IntegrationResult) -> bool {
        let actual = if self.previous {
            result.previous_status()
        } else {
            result.status
        };
        actual == self.status
    }
}
