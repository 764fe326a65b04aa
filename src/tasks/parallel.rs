// src/tasks/parallel.rs

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::integration::{IntegrationResult, TaskResult};
use crate::tasks::exec::{run_command, ExecTask};
use crate::tasks::{Task, TaskContext, TaskOutcome};

/// Explicit fan-out task: runs several commands concurrently, joins them
/// all, and reports a single aggregated success/failure to its parent.
///
/// Only subprocess commands can fan out; they do not touch the result while
/// running, their outputs are appended in declared order after the join.
pub struct ParallelTask {
    name: String,
    commands: Vec<ExecTask>,
}

impl ParallelTask {
    pub fn new(name: impl Into<String>, commands: Vec<ExecTask>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }
}

impl Task for ParallelTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        result: &'a mut IntegrationResult,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let mut handles = Vec::with_capacity(self.commands.len());

            for spec in &self.commands {
                let name = spec.name.clone();
                let cmd = spec.cmd.clone();
                let timeout = spec.timeout;
                let cwd = result.working_dir.clone();
                let ctx = ctx.clone();

                handles.push(tokio::spawn(async move {
                    let out = run_command(&name, &cmd, &cwd, timeout, &ctx).await;
                    (name, out)
                }));
            }

            let mut failed = 0usize;
            for handle in handles {
                let (name, out) = handle
                    .await
                    .map_err(|e| anyhow::anyhow!("parallel branch panicked: {e}"))?;

                match out {
                    Ok(out) => {
                        if !out.success {
                            failed += 1;
                        }
                        result.task_results.push(TaskResult {
                            name,
                            success: out.success,
                            output: out.output,
                        });
                    }
                    Err(err) => {
                        failed += 1;
                        warn!(task = %name, error = %err, "parallel command faulted");
                        result.task_results.push(TaskResult {
                            name,
                            success: false,
                            output: format!("{err:#}"),
                        });
                    }
                }
            }

            if failed == 0 {
                Ok(TaskOutcome::Success)
            } else {
                Ok(TaskOutcome::failed(format!(
                    "{failed} of {} parallel commands failed",
                    self.commands.len()
                )))
            }
        })
    }
}
