// src/config/watch.rs

//! Config-file watcher backing hot reload.
//!
//! Edits are coalesced with a short quiet period so an editor's
//! write-then-rename dance produces one reload, not several. The watcher
//! only reports that the file changed; reading and validating the new
//! contents is the caller's job, so a half-written file never reaches the
//! running projects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

const DEBOUNCE_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Handle for the config-file watcher.
///
/// Exists mainly so the underlying `RecommendedWatcher` is kept alive for as
/// long as needed. Dropping this handle stops file watching.
pub struct ConfigWatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher on the config file's parent directory and send
/// `()` on `reload_tx` whenever the file itself changes.
///
/// Watching the parent (not the file) survives rename-into-place saves.
pub fn spawn_config_watcher(
    config_path: impl Into<PathBuf>,
    reload_tx: mpsc::Sender<()>,
) -> Result<ConfigWatcherHandle> {
    let config_path: PathBuf = config_path.into();
    let config_path = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.clone());
    let watch_dir: PathBuf = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // Tracing is not usable from this callback thread.
                    eprintln!("buildloop: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("buildloop: config watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching config directory {watch_dir:?}"))?;

    info!(path = ?config_path, "config file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let relevant = event
                .paths
                .iter()
                .any(|p| p.as_path() == config_path || p.file_name() == config_path.file_name());
            if !relevant {
                continue;
            }

            debug!(?event, "config file changed");

            // Quiet period: swallow the burst of events an editor save emits.
            let deadline = tokio::time::sleep(DEBOUNCE_QUIET_PERIOD);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    more = event_rx.recv() => {
                        if more.is_none() {
                            break;
                        }
                    }
                }
            }

            if reload_tx.send(()).await.is_err() {
                break;
            }
        }
        debug!("config watcher event loop finished");
    });

    Ok(ConfigWatcherHandle { _inner: watcher })
}
