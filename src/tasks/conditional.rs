// src/tasks/conditional.rs

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::integration::IntegrationResult;
use crate::tasks::condition::Condition;
use crate::tasks::sequence::run_sequence;
use crate::tasks::{Task, TaskContext, TaskOutcome};

/// Task list guarded by a [`Condition`].
///
/// A false guard skips the whole node, including its nested task list,
/// without affecting the parent sequence's success or failure.
pub struct ConditionalTask {
    name: String,
    condition: Box<dyn Condition>,
    tasks: Vec<Box<dyn Task>>,
}

impl ConditionalTask {
    pub fn new(
        name: impl Into<String>,
        condition: Box<dyn Condition>,
        tasks: Vec<Box<dyn Task>>,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            tasks,
        }
    }
}

impl Task for ConditionalTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        result: &'a mut IntegrationResult,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move {
            if !self.condition.evaluate(result) {
                debug!(task = %self.name, "condition false; skipping nested tasks");
                return Ok(TaskOutcome::Success);
            }

            run_sequence(&self.tasks, result, ctx).await
        })
    }
}
