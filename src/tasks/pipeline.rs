// src/tasks/pipeline.rs

//! The build pipeline: an ordered task stage plus an always-run
//! publisher/cleanup stage.

use tracing::{debug, error, warn};

use crate::integration::{IntegrationResult, IntegrationStatus};
use crate::tasks::{Task, TaskContext, TaskOutcome};

/// Ordered/conditional composition of executable steps for one project.
pub struct Pipeline {
    tasks: Vec<Box<dyn Task>>,
    publishers: Vec<Box<dyn Task>>,
}

impl Pipeline {
    pub fn new(tasks: Vec<Box<dyn Task>>, publishers: Vec<Box<dyn Task>>) -> Self {
        Self { tasks, publishers }
    }

    /// Execute the pipeline against `result`, setting its terminal status.
    ///
    /// - Tasks run strictly in declared order; the first failure stops the
    ///   stage (later siblings are skipped).
    /// - An unexpected task fault is converted to an `Exception` status with
    ///   the fault attached to the result, never propagated upward.
    /// - The cancellation signal is checked between steps; a cancelled build
    ///   ends with `Cancelled`, distinct from `Failure`.
    /// - Publishers always run afterwards, with cancellation masked so
    ///   cleanup completes, and cannot change the build status.
    pub async fn run(&self, result: &mut IntegrationResult, ctx: &TaskContext) {
        let mut status = IntegrationStatus::Success;

        for task in &self.tasks {
            if ctx.is_cancelled() {
                status = IntegrationStatus::Cancelled;
                break;
            }

            match task.execute(result, ctx).await {
                Ok(TaskOutcome::Success) => {
                    debug!(project = %result.project, task = %task.name(), "task succeeded");
                }
                Ok(TaskOutcome::Failed { message }) => {
                    if ctx.is_cancelled() {
                        status = IntegrationStatus::Cancelled;
                    } else {
                        warn!(
                            project = %result.project,
                            task = %task.name(),
                            %message,
                            "task failed; skipping remaining siblings"
                        );
                        status = IntegrationStatus::Failure;
                    }
                    break;
                }
                Err(err) => {
                    error!(
                        project = %result.project,
                        task = %task.name(),
                        error = %err,
                        "task raised an unexpected fault"
                    );
                    result.fault = Some(format!("{err:#}"));
                    status = IntegrationStatus::Exception;
                    break;
                }
            }
        }

        // A cancel that landed after the last task still wins over Success.
        if ctx.is_cancelled() && status == IntegrationStatus::Success {
            status = IntegrationStatus::Cancelled;
        }

        result.status = status;

        let publisher_ctx = TaskContext::uncancellable();
        for publisher in &self.publishers {
            match publisher.execute(result, &publisher_ctx).await {
                Ok(TaskOutcome::Success) => {}
                Ok(TaskOutcome::Failed { message }) => {
                    warn!(
                        project = %result.project,
                        publisher = %publisher.name(),
                        %message,
                        "publisher failed"
                    );
                }
                Err(err) => {
                    warn!(
                        project = %result.project,
                        publisher = %publisher.name(),
                        error = %err,
                        "publisher raised an unexpected fault"
                    );
                    if result.fault.is_none() {
                        result.fault = Some(format!("{err:#}"));
                    }
                }
            }
        }
    }
}
