// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod integration;
pub mod logging;
pub mod scm;
pub mod state;
pub mod tasks;
pub mod triggers;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{BuildServer, ServerOptions};
use crate::state::FileStateStore;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the state store
/// - the build server and its per-project integrator tasks
/// - the config-file watcher for hot reload
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config_path();
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let store = Arc::new(FileStateStore::new(cfg.server.state_dir.clone()));

    let options = ServerOptions {
        once: args.once,
        only_project: args.project.clone(),
    };
    let server = BuildServer::start(&cfg, store, options)?;

    if args.once {
        // Each project runs a single poll cycle and exits on its own.
        server.wait_all().await;
        return Ok(());
    }

    // Config hot reload (disabled in --once mode).
    let (reload_tx, mut reload_rx) = mpsc::channel::<()>(4);
    let _watcher_handle = config::spawn_config_watcher(&config_path, reload_tx)?;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown requested");
                break;
            }
            changed = reload_rx.recv() => {
                if changed.is_none() {
                    break;
                }
                match load_and_validate(&config_path) {
                    Ok(new_cfg) => {
                        info!("config file changed; applying");
                        server.reload(&new_cfg).await;
                    }
                    Err(err) => {
                        // Keep running on the last good configuration.
                        warn!(error = %err, "config file changed but is invalid; ignoring");
                    }
                }
            }
        }
    }

    server.stop_all().await;
    server.wait_all().await;
    Ok(())
}

/// Simple dry-run output: print projects, triggers and tasks.
fn print_dry_run(cfg: &ConfigFile) {
    println!("buildloop dry-run");
    println!("  server.state_dir = {:?}", cfg.server.state_dir);
    println!("  server.poll_interval_secs = {}", cfg.server.poll_interval_secs);
    println!();

    if !cfg.groups.is_empty() {
        println!("queue groups ({}):", cfg.groups.len());
        for (name, group) in cfg.groups.iter() {
            println!("  - {name} (max_concurrent: {})", group.max_concurrent);
        }
        println!();
    }

    println!("projects ({}):", cfg.projects.len());
    for (name, project) in cfg.projects.iter() {
        println!("  - {name}");
        println!("      working_dir: {:?}", project.working_dir);
        println!("      artifact_dir: {:?}", project.artifact_dir);
        if let Some(ref group) = project.queue_group {
            println!("      queue_group: {group}");
        }
        println!("      triggers: {}", project.trigger.len());
        for trigger in project.trigger.iter() {
            println!("        {trigger:?}");
        }
        println!("      tasks: {}", project.tasks.len());
        for task in project.tasks.iter() {
            println!("        {task:?}");
        }
        if !project.publishers.is_empty() {
            println!("      publishers: {}", project.publishers.len());
            for task in project.publishers.iter() {
                println!("        {task:?}");
            }
        }
    }
}
