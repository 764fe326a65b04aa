// tests/server_facade.rs

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use buildloop::engine::{BuildServer, ServerOptions};
use buildloop::errors::BuildloopError;
use buildloop::integration::{IntegrationStatus, IntegrationSummary};
use buildloop::state::FileStateStore;
use buildloop_test_utils::builders::{ConfigFileBuilder, ProjectConfigBuilder};
use buildloop_test_utils::{init_tracing, with_timeout};

async fn wait_for_status(server: &BuildServer, project: &str) -> IntegrationSummary {
    with_timeout(async {
        loop {
            if let Some(summary) = server.status_of(project).unwrap() {
                return summary;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

#[tokio::test]
async fn force_build_runs_the_pipeline_and_updates_status() {
    init_tracing();
    let dir = tempdir().unwrap();

    // Long poll interval: nothing builds unless we ask.
    let cfg = ConfigFileBuilder::new()
        .with_poll_interval_secs(3600)
        .with_state_dir(dir.path().join("state"))
        .with_project(
            "api",
            ProjectConfigBuilder::new().exec_task("greet", "echo hello").build(),
        )
        .build();

    let store = Arc::new(FileStateStore::new(dir.path().join("state")));
    let server = BuildServer::start(&cfg, store, ServerOptions::default()).unwrap();

    server.force_build("api", "tester").await.unwrap();
    let summary = wait_for_status(&server, "api").await;

    assert_eq!(summary.label, 1);
    assert_eq!(summary.status, IntegrationStatus::Success);

    server.stop_all().await;
    with_timeout(server.wait_all()).await;
}

#[tokio::test]
async fn unknown_project_requests_are_rejected() {
    init_tracing();
    let dir = tempdir().unwrap();

    let cfg = ConfigFileBuilder::new()
        .with_poll_interval_secs(3600)
        .with_state_dir(dir.path().join("state"))
        .with_project(
            "api",
            ProjectConfigBuilder::new().exec_task("greet", "echo hello").build(),
        )
        .build();

    let store = Arc::new(FileStateStore::new(dir.path().join("state")));
    let server = BuildServer::start(&cfg, store, ServerOptions::default()).unwrap();

    let err = server.force_build("nope", "tester").await.unwrap_err();
    assert!(matches!(err, BuildloopError::UnknownProject(_)));
    let err = server.status_of("nope").unwrap_err();
    assert!(matches!(err, BuildloopError::UnknownProject(_)));

    server.stop_all().await;
    with_timeout(server.wait_all()).await;
}

#[tokio::test]
async fn only_project_option_restricts_scheduling() {
    init_tracing();
    let dir = tempdir().unwrap();

    let cfg = ConfigFileBuilder::new()
        .with_poll_interval_secs(3600)
        .with_state_dir(dir.path().join("state"))
        .with_project(
            "api",
            ProjectConfigBuilder::new().exec_task("a", "echo a").build(),
        )
        .with_project(
            "web",
            ProjectConfigBuilder::new().exec_task("w", "echo w").build(),
        )
        .build();

    let store = Arc::new(FileStateStore::new(dir.path().join("state")));
    let options = ServerOptions {
        once: false,
        only_project: Some("api".to_string()),
    };
    let server = BuildServer::start(&cfg, store, options).unwrap();

    // The excluded project is not schedulable at all.
    let err = server.force_build("web", "tester").await.unwrap_err();
    assert!(matches!(err, BuildloopError::UnknownProject(_)));

    server.force_build("api", "tester").await.unwrap();
    let summary = wait_for_status(&server, "api").await;
    assert_eq!(summary.label, 1);

    server.stop_all().await;
    with_timeout(server.wait_all()).await;
}

#[tokio::test]
async fn reloaded_config_takes_effect_on_the_next_build() {
    init_tracing();
    let dir = tempdir().unwrap();
    let marker = dir.path().join("reloaded-marker");

    let cfg = ConfigFileBuilder::new()
        .with_poll_interval_secs(3600)
        .with_state_dir(dir.path().join("state"))
        .with_project(
            "api",
            ProjectConfigBuilder::new().exec_task("greet", "echo hello").build(),
        )
        .build();

    let store = Arc::new(FileStateStore::new(dir.path().join("state")));
    let server = BuildServer::start(&cfg, store, ServerOptions::default()).unwrap();

    server.force_build("api", "tester").await.unwrap();
    let summary = wait_for_status(&server, "api").await;
    assert_eq!(summary.label, 1);
    assert!(!marker.exists());

    // Same project, new pipeline: the next build must run the new tasks.
    let updated = ConfigFileBuilder::new()
        .with_poll_interval_secs(3600)
        .with_state_dir(dir.path().join("state"))
        .with_project(
            "api",
            ProjectConfigBuilder::new()
                .exec_task("mark", &format!("touch {}", marker.display()))
                .build(),
        )
        .build();
    server.reload(&updated).await;

    server.force_build("api", "tester").await.unwrap();
    let summary = with_timeout(async {
        loop {
            if let Some(summary) = server.status_of("api").unwrap() {
                if summary.label >= 2 {
                    return summary;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert_eq!(summary.status, IntegrationStatus::Success);
    assert!(marker.exists());

    server.stop_all().await;
    with_timeout(server.wait_all()).await;
}

#[tokio::test]
async fn state_survives_a_server_restart() {
    init_tracing();
    let dir = tempdir().unwrap();
    let state_dir = dir.path().join("state");

    let cfg = ConfigFileBuilder::new()
        .with_poll_interval_secs(3600)
        .with_state_dir(state_dir.clone())
        .with_project(
            "api",
            ProjectConfigBuilder::new().exec_task("greet", "echo hello").build(),
        )
        .build();

    {
        let store = Arc::new(FileStateStore::new(state_dir.clone()));
        let server = BuildServer::start(&cfg, store, ServerOptions::default()).unwrap();
        server.force_build("api", "tester").await.unwrap();
        let summary = wait_for_status(&server, "api").await;
        assert_eq!(summary.label, 1);
        server.stop_all().await;
        with_timeout(server.wait_all()).await;
    }

    // Second server over the same state directory resumes at label 2.
    let store = Arc::new(FileStateStore::new(state_dir));
    let server = BuildServer::start(&cfg, store, ServerOptions::default()).unwrap();
    server.force_build("api", "tester").await.unwrap();

    let summary = with_timeout(async {
        loop {
            if let Some(summary) = server.status_of("api").unwrap() {
                if summary.label >= 2 {
                    return summary;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert_eq!(summary.label, 2);

    server.stop_all().await;
    with_timeout(server.wait_all()).await;
}
