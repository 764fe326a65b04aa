// src/tasks/exec.rs

//! Subprocess task runner.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::integration::{IntegrationResult, TaskResult};
use crate::tasks::{Task, TaskContext, TaskOutcome};

/// How a subprocess run ended.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: String,
    pub timed_out: bool,
    pub cancelled: bool,
}

/// Atomic task that runs a shell command in the build's working directory.
///
/// The subprocess is bounded by an optional timeout; exceeding it kills the
/// child and records a timeout failure instead of hanging the build worker.
#[derive(Debug, Clone)]
pub struct ExecTask {
    pub name: String,
    pub cmd: String,
    pub timeout: Option<Duration>,
}

impl ExecTask {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            timeout,
        }
    }
}

impl Task for ExecTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        result: &'a mut IntegrationResult,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let out = run_command(&self.name, &self.cmd, &result.working_dir, self.timeout, ctx)
                .await?;

            result.task_results.push(TaskResult {
                name: self.name.clone(),
                success: out.success,
                output: out.output,
            });

            if out.success {
                Ok(TaskOutcome::Success)
            } else if out.timed_out {
                Ok(TaskOutcome::failed(format!(
                    "task '{}' timed out after {:?}",
                    self.name, self.timeout
                )))
            } else if out.cancelled {
                Ok(TaskOutcome::failed(format!(
                    "task '{}' cancelled",
                    self.name
                )))
            } else {
                Ok(TaskOutcome::failed(format!(
                    "task '{}' exited with code {:?}",
                    self.name, out.exit_code
                )))
            }
        })
    }
}

/// Run one shell command, collecting its combined output.
///
/// - Resolves when the process exits, the timeout elapses (child killed) or
///   the context is cancelled (child killed).
pub(crate) async fn run_command(
    name: &str,
    cmd_line: &str,
    cwd: &Path,
    timeout: Option<Duration>,
    ctx: &TaskContext,
) -> anyhow::Result<CommandOutput> {
    info!(task = %name, cmd = %cmd_line, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{name}'"))?;

    let wait = child.wait_with_output();
    tokio::pin!(wait);

    // A missing timeout never fires.
    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        out = &mut wait => {
            let out = out.with_context(|| format!("waiting for process of task '{name}'"))?;
            let code = out.status.code();
            let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&out.stderr));

            info!(
                task = %name,
                exit_code = code,
                success = out.status.success(),
                "task process exited"
            );

            Ok(CommandOutput {
                success: out.status.success(),
                exit_code: code,
                output: combined,
                timed_out: false,
                cancelled: false,
            })
        }

        _ = deadline => {
            // Dropping the wait future kills the child (kill_on_drop).
            warn!(task = %name, ?timeout, "task process exceeded timeout; killing");
            Ok(CommandOutput {
                success: false,
                exit_code: None,
                output: format!("timed out after {timeout:?}"),
                timed_out: true,
                cancelled: false,
            })
        }

        _ = ctx.cancelled() => {
            debug!(task = %name, "cancellation requested; killing task process");
            Ok(CommandOutput {
                success: false,
                exit_code: None,
                output: "cancelled".to_string(),
                timed_out: false,
                cancelled: true,
            })
        }
    }
}
