// src/state/store.rs

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::{BuildloopError, Result};
use crate::state::{ProjectState, StateStore};

/// Stores one TOML record per project under a state directory.
///
/// Saves go through a temp file followed by an atomic rename, so a crash
/// mid-save leaves either the old or the new record on disk. A per-project
/// async mutex serializes same-project saves; distinct projects never
/// contend.
pub struct FileStateStore {
    dir: PathBuf,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn state_path(&self, project: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", file_stem(project)))
    }

    fn lock_for(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Derive a filesystem-safe file stem from a project name.
///
/// The mapping is injective: every byte outside `[A-Za-z0-9.-]`, including
/// `_` itself, becomes a `_XX` hex escape, so distinct project names can
/// never share a record file.
fn file_stem(project: &str) -> String {
    let mut stem = String::with_capacity(project.len());
    for byte in project.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' => stem.push(byte as char),
            other => stem.push_str(&format!("_{other:02x}")),
        }
    }
    stem
}

fn load_record(path: &Path, project: &str) -> Result<Option<ProjectState>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    // The record exists: a parse failure here is an operator problem, not
    // a first-ever build.
    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| BuildloopError::StateCorrupt {
            project: project.to_string(),
            reason: e.to_string(),
        })
}

fn save_record(dir: &Path, path: &Path, state: &ProjectState) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating state directory at {dir:?}"))
        .map_err(BuildloopError::Other)?;

    let serialized = toml::to_string_pretty(state)
        .map_err(|e| BuildloopError::ConfigError(format!("serializing state record: {e}")))?;

    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, serialized)
        .with_context(|| format!("writing state record to {tmp:?}"))
        .map_err(BuildloopError::Other)?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {tmp:?} into place"))
        .map_err(BuildloopError::Other)?;

    Ok(())
}

impl StateStore for FileStateStore {
    fn load<'a>(
        &'a self,
        project: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProjectState>>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.state_path(project);
            let loaded = load_record(&path, project)?;
            debug!(
                project = %project,
                found = loaded.is_some(),
                path = ?path,
                "loaded project state"
            );
            Ok(loaded)
        })
    }

    fn save<'a>(
        &'a self,
        project: &'a str,
        state: &'a ProjectState,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let lock = self.lock_for(project);
            let _guard = lock.lock().await;

            let path = self.state_path(project);
            save_record(&self.dir, &path, state)?;

            info!(
                project = %project,
                label = state.label,
                status = %state.status,
                "saved project state"
            );
            Ok(())
        })
    }
}

/// In-memory store, for tests and ephemeral setups.
#[derive(Default)]
pub struct MemoryStateStore {
    records: std::sync::Mutex<HashMap<String, ProjectState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored record (test helper).
    pub fn get(&self, project: &str) -> Option<ProjectState> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(project).cloned()
    }
}

impl StateStore for MemoryStateStore {
    fn load<'a>(
        &'a self,
        project: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ProjectState>>> + Send + 'a>> {
        Box::pin(async move {
            let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            Ok(records.get(project).cloned())
        })
    }

    fn save<'a>(
        &'a self,
        project: &'a str,
        state: &'a ProjectState,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.insert(project.to_string(), state.clone());
            Ok(())
        })
    }
}
