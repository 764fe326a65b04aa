use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use buildloop::integration::{IntegrationResult, TaskResult};
use buildloop::tasks::{Task, TaskContext, TaskOutcome};

/// What a [`FakeTask`] does when executed.
#[derive(Clone)]
pub enum FakeBehaviour {
    /// Record the run and succeed.
    Succeed,
    /// Record the run and report an expected failure.
    Fail(String),
    /// Record the run and raise an unexpected fault.
    Fault(String),
    /// Record the run, then block until the gate is released (success) or
    /// the build is cancelled (failure).
    WaitForGate(Arc<Notify>),
}

/// A scriptable task that:
/// - records its executions into a shared log
/// - produces a configured outcome without spawning any process.
pub struct FakeTask {
    name: String,
    behaviour: FakeBehaviour,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeTask {
    pub fn new(
        name: &str,
        behaviour: FakeBehaviour,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            log,
        }
    }

    /// Shorthand for a task that just succeeds.
    pub fn succeeding(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self::new(name, FakeBehaviour::Succeed, log)
    }

    /// Shorthand for a task that fails with the given message.
    pub fn failing(name: &str, message: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self::new(name, FakeBehaviour::Fail(message.to_string()), log)
    }
}

impl Task for FakeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute<'a>(
        &'a self,
        result: &'a mut IntegrationResult,
        ctx: &'a TaskContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut guard = self.log.lock().unwrap();
                guard.push(self.name.clone());
            }

            let outcome = match &self.behaviour {
                FakeBehaviour::Succeed => TaskOutcome::Success,
                FakeBehaviour::Fail(message) => TaskOutcome::failed(message.clone()),
                FakeBehaviour::Fault(message) => {
                    return Err(anyhow::anyhow!("{message}"));
                }
                FakeBehaviour::WaitForGate(gate) => {
                    tokio::select! {
                        _ = gate.notified() => TaskOutcome::Success,
                        _ = ctx.cancelled() => {
                            TaskOutcome::failed(format!("task '{}' cancelled", self.name))
                        }
                    }
                }
            };

            result.task_results.push(TaskResult {
                name: self.name.clone(),
                success: outcome.is_success(),
                output: String::new(),
            });

            Ok(outcome)
        })
    }
}
