// src/tasks/sequence.rs

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::integration::IntegrationResult;
use crate::tasks::{Task, TaskContext, TaskOutcome};

/// Composite task that runs its children strictly in declared order.
///
/// The first child that fails stops the sequence; later siblings do not run.
pub struct SequenceTask {
    name: String,
    tasks: Vec<Box<dyn Task>>,
}

impl SequenceTask {
    pub fn new(name: impl Into<String>, tasks: Vec<Box<dyn Task>>) -> Self {
        Self {
            name: name.into(),
            tasks,
        }
    }
}

impl Task for SequenceTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        result: &'a mut IntegrationResult,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(run_sequence(&self.tasks, result, ctx))
    }
}

/// Shared sequential-execution loop for composite tasks.
pub(crate) async fn run_sequence(
    tasks: &[Box<dyn Task>],
    result: &mut IntegrationResult,
    ctx: &TaskContext,
) -> anyhow::Result<TaskOutcome> {
    for task in tasks {
        if ctx.is_cancelled() {
            return Ok(TaskOutcome::failed("cancelled"));
        }

        let outcome = task.execute(result, ctx).await?;
        if let TaskOutcome::Failed { message } = outcome {
            debug!(task = %task.name(), "sequence stopping at first failure");
            return Ok(TaskOutcome::Failed { message });
        }
    }

    Ok(TaskOutcome::Success)
}
