// src/tasks/mod.rs

//! Build pipeline tasks.
//!
//! A [`Task`] is one step of the pipeline: it reads and writes the
//! [`IntegrationResult`] it is handed and reports success or failure.
//! Variants are a closed set built from tagged config entries: atomic
//! subprocess tasks, sequential lists, condition-guarded lists and an
//! explicit parallel fan-out. Tasks never hold cross-project state.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::watch;

use crate::integration::IntegrationResult;

pub mod condition;
pub mod conditional;
pub mod exec;
pub mod parallel;
pub mod pipeline;
pub mod sequence;

pub use condition::{CompareCondition, Condition, StatusCondition};
pub use conditional::ConditionalTask;
pub use exec::ExecTask;
pub use parallel::ParallelTask;
pub use pipeline::Pipeline;
pub use sequence::SequenceTask;

/// Outcome of one task, as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed { message: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        TaskOutcome::Failed {
            message: message.into(),
        }
    }
}

/// Per-build execution context threaded through the pipeline.
///
/// Carries the cooperative cancellation signal; tasks check it between
/// steps and subprocess tasks select on it to kill their child directly.
#[derive(Debug, Clone)]
pub struct TaskContext {
    cancel: watch::Receiver<bool>,
}

impl TaskContext {
    pub fn new(cancel: watch::Receiver<bool>) -> Self {
        Self { cancel }
    }

    /// Context whose cancellation can never fire (used for the always-run
    /// publisher stage, which must complete even after a cancel).
    pub fn uncancellable() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { cancel: rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves when cancellation is requested; pends forever if the
    /// cancel sender is gone (cancellation can no longer happen).
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// One step of the build pipeline.
///
/// An `Err` return is an *unexpected fault*: the pipeline converts it to a
/// failure, attaches the fault to the result for diagnostics and still runs
/// the always-run stage. Expected failures are `Ok(TaskOutcome::Failed)`.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    fn execute<'a>(
        &'a self,
        result: &'a mut IntegrationResult,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TaskOutcome>> + Send + 'a>>;
}

/// Build a task list from validated configuration.
pub fn from_config(cfgs: &[crate::config::TaskConfig]) -> crate::errors::Result<Vec<Box<dyn Task>>> {
    cfgs.iter()
        .enumerate()
        .map(|(idx, cfg)| build_task(cfg, idx))
        .collect()
}

fn build_task(cfg: &crate::config::TaskConfig, idx: usize) -> crate::errors::Result<Box<dyn Task>> {
    use crate::config::TaskConfig;

    let task: Box<dyn Task> = match cfg {
        TaskConfig::Exec {
            name,
            cmd,
            timeout_secs,
        } => Box::new(ExecTask::new(
            name.clone().unwrap_or_else(|| format!("exec-{idx}")),
            cmd.clone(),
            timeout_secs.map(std::time::Duration::from_secs),
        )),
        TaskConfig::Sequence { name, tasks } => Box::new(SequenceTask::new(
            name.clone().unwrap_or_else(|| format!("sequence-{idx}")),
            from_config(tasks)?,
        )),
        TaskConfig::Conditional {
            name,
            condition,
            tasks,
        } => Box::new(ConditionalTask::new(
            name.clone().unwrap_or_else(|| format!("conditional-{idx}")),
            condition_from_config(condition),
            from_config(tasks)?,
        )),
        TaskConfig::Parallel { name, tasks } => {
            let mut commands = Vec::new();
            for (child_idx, child) in tasks.iter().enumerate() {
                match child {
                    TaskConfig::Exec {
                        name,
                        cmd,
                        timeout_secs,
                    } => commands.push(ExecTask::new(
                        name.clone()
                            .unwrap_or_else(|| format!("parallel-{idx}-{child_idx}")),
                        cmd.clone(),
                        timeout_secs.map(std::time::Duration::from_secs),
                    )),
                    other => {
                        // Validation rejects this; guard anyway.
                        return Err(crate::errors::BuildloopError::ConfigError(format!(
                            "parallel task may only contain exec tasks, found {other:?}"
                        )));
                    }
                }
            }
            Box::new(ParallelTask::new(
                name.clone().unwrap_or_else(|| format!("parallel-{idx}")),
                commands,
            ))
        }
    };

    Ok(task)
}

fn condition_from_config(cfg: &crate::config::ConditionConfig) -> Box<dyn Condition> {
    use crate::config::ConditionConfig;

    match cfg {
        ConditionConfig::Compare { value1, value2 } => {
            Box::new(CompareCondition::new(value1.clone(), value2.clone()))
        }
        ConditionConfig::Status { status, previous } => {
            Box::new(StatusCondition::new(*status, *previous))
        }
    }
}
