// tests/pipeline_semantics.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use buildloop::integration::IntegrationStatus;
use buildloop::tasks::{Pipeline, Task, TaskContext};
use buildloop_test_utils::builders::integration_result;
use buildloop_test_utils::fake_task::{FakeBehaviour, FakeTask};
use buildloop_test_utils::{init_tracing, with_timeout};

fn boxed(tasks: Vec<FakeTask>) -> Vec<Box<dyn Task>> {
    tasks
        .into_iter()
        .map(|t| Box::new(t) as Box<dyn Task>)
        .collect()
}

fn log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn tasks_run_in_declared_order_and_succeed() {
    init_tracing();
    let log = log();

    let pipeline = Pipeline::new(
        boxed(vec![
            FakeTask::succeeding("compile", log.clone()),
            FakeTask::succeeding("test", log.clone()),
            FakeTask::succeeding("package", log.clone()),
        ]),
        vec![],
    );

    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;

    assert_eq!(result.status, IntegrationStatus::Success);
    assert_eq!(entries(&log), vec!["compile", "test", "package"]);
    assert_eq!(result.task_results.len(), 3);
    assert!(result.task_results.iter().all(|t| t.success));
}

#[tokio::test]
async fn first_failure_skips_remaining_siblings() {
    init_tracing();
    let log = log();

    let pipeline = Pipeline::new(
        boxed(vec![
            FakeTask::succeeding("compile", log.clone()),
            FakeTask::failing("test", "2 tests failed", log.clone()),
            FakeTask::succeeding("package", log.clone()),
        ]),
        vec![],
    );

    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;

    assert_eq!(result.status, IntegrationStatus::Failure);
    assert_eq!(entries(&log), vec!["compile", "test"]);
    assert!(result.fault.is_none());
}

#[tokio::test]
async fn fault_becomes_exception_with_diagnostic_attached() {
    init_tracing();
    let log = log();

    let pipeline = Pipeline::new(
        boxed(vec![
            FakeTask::succeeding("compile", log.clone()),
            FakeTask::new(
                "deploy",
                FakeBehaviour::Fault("disk full".to_string()),
                log.clone(),
            ),
            FakeTask::succeeding("notify", log.clone()),
        ]),
        vec![],
    );

    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;

    assert_eq!(result.status, IntegrationStatus::Exception);
    assert_eq!(entries(&log), vec!["compile", "deploy"]);
    let fault = result.fault.expect("fault should be recorded");
    assert!(fault.contains("disk full"));
}

#[tokio::test]
async fn publishers_always_run_and_cannot_change_status() {
    init_tracing();
    let log = log();

    let pipeline = Pipeline::new(
        boxed(vec![FakeTask::failing(
            "test",
            "boom",
            log.clone(),
        )]),
        boxed(vec![
            FakeTask::succeeding("report", log.clone()),
            FakeTask::failing("email", "smtp down", log.clone()),
        ]),
    );

    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;

    // Both publishers ran despite the stage failure and their own failure.
    assert_eq!(entries(&log), vec!["test", "report", "email"]);
    assert_eq!(result.status, IntegrationStatus::Failure);
}

#[tokio::test]
async fn publisher_fault_is_recorded_without_touching_status() {
    init_tracing();
    let log = log();

    let pipeline = Pipeline::new(
        boxed(vec![FakeTask::succeeding("compile", log.clone())]),
        boxed(vec![FakeTask::new(
            "archive",
            FakeBehaviour::Fault("archival backend offline".to_string()),
            log.clone(),
        )]),
    );

    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;

    assert_eq!(result.status, IntegrationStatus::Success);
    let fault = result.fault.expect("publisher fault should be recorded");
    assert!(fault.contains("archival backend offline"));
}

#[cfg(unix)]
#[tokio::test]
async fn parallel_fan_out_joins_and_aggregates_child_failures() {
    init_tracing();

    let parallel = buildloop::tasks::ParallelTask::new(
        "checks",
        vec![
            buildloop::tasks::ExecTask::new("lint", "true", None),
            buildloop::tasks::ExecTask::new("docs", "false", None),
        ],
    );
    let pipeline = Pipeline::new(vec![Box::new(parallel)], vec![]);

    let mut result = integration_result("api", 1);
    with_timeout(pipeline.run(&mut result, &TaskContext::uncancellable())).await;

    assert_eq!(result.status, IntegrationStatus::Failure);
    assert_eq!(result.task_results.len(), 2);
    let docs = result.task_results.iter().find(|t| t.name == "docs").unwrap();
    assert!(!docs.success);
}

#[cfg(unix)]
#[tokio::test]
async fn exec_timeout_kills_the_subprocess_and_records_a_failure() {
    init_tracing();

    let slow = buildloop::tasks::ExecTask::new(
        "sleepy",
        "sleep 30",
        Some(Duration::from_millis(100)),
    );
    let pipeline = Pipeline::new(vec![Box::new(slow)], vec![]);

    let mut result = integration_result("api", 1);
    with_timeout(pipeline.run(&mut result, &TaskContext::uncancellable())).await;

    assert_eq!(result.status, IntegrationStatus::Failure);
}

#[tokio::test]
async fn false_condition_skips_nested_tasks_without_affecting_success() {
    init_tracing();
    let log = log();

    let guarded = buildloop::tasks::ConditionalTask::new(
        "on-recovery",
        Box::new(buildloop::tasks::CompareCondition::new("a", "b")),
        boxed(vec![FakeTask::failing(
            "never-runs",
            "should be skipped",
            log.clone(),
        )]),
    );

    let mut tasks = boxed(vec![FakeTask::succeeding("compile", log.clone())]);
    tasks.push(Box::new(guarded));
    tasks.extend(boxed(vec![FakeTask::succeeding("package", log.clone())]));

    let pipeline = Pipeline::new(tasks, vec![]);
    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;

    assert_eq!(result.status, IntegrationStatus::Success);
    assert_eq!(entries(&log), vec!["compile", "package"]);
}

#[tokio::test]
async fn status_condition_gates_on_the_previous_integration() {
    init_tracing();
    let log = log();

    // Runs only when the previous integration failed.
    let guarded = buildloop::tasks::ConditionalTask::new(
        "notify-recovery",
        Box::new(buildloop::tasks::StatusCondition::new(
            IntegrationStatus::Failure,
            true,
        )),
        boxed(vec![FakeTask::succeeding("announce", log.clone())]),
    );
    let pipeline = Pipeline::new(vec![Box::new(guarded)], vec![]);

    // Previous build was a failure: the nested task runs.
    let mut result = integration_result("api", 2);
    result.last_integration = Some(buildloop_test_utils::builders::summary(
        1,
        IntegrationStatus::Failure,
        result.start_time,
    ));
    pipeline.run(&mut result, &TaskContext::uncancellable()).await;
    assert_eq!(entries(&log), vec!["announce"]);
    assert_eq!(result.status, IntegrationStatus::Success);

    // First-ever build (no previous integration): skipped.
    let mut fresh = integration_result("api", 1);
    pipeline.run(&mut fresh, &TaskContext::uncancellable()).await;
    assert_eq!(entries(&log), vec!["announce"]);
    assert_eq!(fresh.status, IntegrationStatus::Success);
}

#[tokio::test]
async fn cancel_before_start_runs_no_tasks() {
    init_tracing();
    let log = log();

    let pipeline = Pipeline::new(
        boxed(vec![FakeTask::succeeding("compile", log.clone())]),
        vec![],
    );

    let (tx, rx) = watch::channel(true);
    let mut result = integration_result("api", 1);
    pipeline.run(&mut result, &TaskContext::new(rx)).await;
    drop(tx);

    assert_eq!(result.status, IntegrationStatus::Cancelled);
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn cancel_mid_build_ends_cancelled_and_still_publishes() {
    init_tracing();
    let log = log();
    let gate = Arc::new(tokio::sync::Notify::new());

    let pipeline = Pipeline::new(
        boxed(vec![
            FakeTask::succeeding("compile", log.clone()),
            FakeTask::new(
                "test",
                FakeBehaviour::WaitForGate(gate.clone()),
                log.clone(),
            ),
            FakeTask::succeeding("package", log.clone()),
        ]),
        boxed(vec![FakeTask::succeeding("report", log.clone())]),
    );

    let (tx, rx) = watch::channel(false);
    let ctx = TaskContext::new(rx);
    let mut result = integration_result("api", 1);

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
    };

    with_timeout(async {
        tokio::join!(pipeline.run(&mut result, &ctx), canceller);
    })
    .await;

    assert_eq!(result.status, IntegrationStatus::Cancelled);
    // "package" never ran; the publisher still did.
    assert_eq!(entries(&log), vec!["compile", "test", "report"]);
}
