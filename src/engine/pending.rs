// src/engine/pending.rs

//! Pending build requests that arrive while an integration is in progress.
//!
//! The integrator loop is sequential, so a force request received mid-build
//! cannot start a second build; it is remembered here and serviced once the
//! current cycle finishes. Requests are coalesced: an identical queued
//! request is not duplicated, and the queue is bounded so a flood of force
//! clicks cannot pile up runs.

use std::collections::VecDeque;

use tracing::{debug, warn};

/// A remembered force-build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub requested_by: String,
}

#[derive(Debug)]
pub struct PendingRequests {
    max: usize,
    requests: VecDeque<BuildRequest>,
}

impl PendingRequests {
    /// `max` is clamped to at least 1; a zero-length queue would silently
    /// drop every request.
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            requests: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Record a request for a future cycle.
    pub fn record(&mut self, request: BuildRequest) {
        if self.requests.contains(&request) {
            debug!(
                requested_by = %request.requested_by,
                "identical force request already pending; coalescing"
            );
            return;
        }

        self.requests.push_back(request);

        if self.requests.len() > self.max {
            warn!(
                pending = self.requests.len(),
                max = self.max,
                "exceeded pending request limit; dropping oldest"
            );
            while self.requests.len() > self.max {
                self.requests.pop_front();
            }
        }
    }

    /// Take the oldest pending request, if any.
    pub fn pop(&mut self) -> Option<BuildRequest> {
        self.requests.pop_front()
    }
}
