// src/scm/null.rs

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::scm::{Modification, ScmResult, SourceControl};

/// Adapter that never reports modifications.
///
/// Useful for projects that are only ever built by schedule or force
/// requests, and as a stand-in while wiring up configuration.
#[derive(Debug, Default)]
pub struct NullSourceControl;

impl SourceControl for NullSourceControl {
    fn get_modifications<'a>(
        &'a self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = ScmResult<Vec<Modification>>> + Send + 'a>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
