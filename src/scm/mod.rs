// src/scm/mod.rs

//! Source-control boundary: modification records, the pluggable
//! [`SourceControl`] adapter trait, and in-tree adapters.
//!
//! Concrete VCS history parsers live outside this crate; they only have to
//! implement [`SourceControl`] and return [`Modification`]s for a time
//! window. The integrator treats a [`ScmError::Transient`] failure as
//! inconclusive and retries the same window on the next poll.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod modification;
pub mod multi;
pub mod null;

pub use modification::{ChangeType, Modification};
pub use multi::MultiSourceControl;
pub use null::NullSourceControl;

/// Failure while querying a version-control system.
#[derive(Error, Debug)]
pub enum ScmError {
    /// Network/auth/timeout class failure: inconclusive, retried next poll.
    #[error("transient source-control failure: {0}")]
    Transient(String),

    /// Parse/protocol class failure that retrying will not fix.
    #[error("source-control failure: {0}")]
    Fatal(String),
}

pub type ScmResult<T> = std::result::Result<T, ScmError>;

/// Adapter over one version-control system.
///
/// Implementations must be repeatable-read for the same `(from, to]` window
/// and must return an empty vector (not an error) when nothing changed.
pub trait SourceControl: Send + Sync {
    fn get_modifications<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = ScmResult<Vec<Modification>>> + Send + 'a>>;
}

/// Build a source-control adapter from validated configuration.
pub fn from_config(cfg: &crate::config::ScmConfig) -> Box<dyn SourceControl> {
    match cfg {
        crate::config::ScmConfig::Null => Box::new(NullSourceControl),
        crate::config::ScmConfig::Multi { sources } => {
            let built = sources.iter().map(from_config).collect();
            Box::new(MultiSourceControl::new(built))
        }
    }
}
