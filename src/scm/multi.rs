// src/scm/multi.rs

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::scm::{Modification, ScmResult, SourceControl};

/// Merges the modification streams of several adapters into one.
///
/// The merged sequence is sorted by `modified_time`. If any child adapter
/// fails, the whole query fails with that error so the integrator retries
/// the full window rather than acting on a partial view.
pub struct MultiSourceControl {
    sources: Vec<Box<dyn SourceControl>>,
}

impl MultiSourceControl {
    pub fn new(sources: Vec<Box<dyn SourceControl>>) -> Self {
        Self { sources }
    }
}

impl SourceControl for MultiSourceControl {
    fn get_modifications<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = ScmResult<Vec<Modification>>> + Send + 'a>> {
        Box::pin(async move {
            let mut merged: Vec<Modification> = Vec::new();

            for source in &self.sources {
                let mods = source.get_modifications(from, to).await?;
                merged.extend(mods);
            }

            merged.sort_by_key(|m| m.modified_time);
            debug!(count = merged.len(), "merged modifications from all sources");
            Ok(merged)
        })
    }
}
