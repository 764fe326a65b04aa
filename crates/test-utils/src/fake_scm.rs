use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use buildloop::scm::{Modification, ScmError, ScmResult, SourceControl};

/// One scripted answer for a modification query.
#[derive(Clone)]
pub enum ScmResponse {
    Modifications(Vec<Modification>),
    Transient(String),
    Fatal(String),
}

/// A scripted source-control adapter.
///
/// Answers queries from a queue of [`ScmResponse`]s and records every
/// `(from, to)` window it is asked about. Once the script is exhausted it
/// reports "no modifications".
#[derive(Clone, Default)]
pub struct FakeSourceControl {
    responses: Arc<Mutex<VecDeque<ScmResponse>>>,
    queries: Arc<Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: ScmResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.push_back(response);
    }

    pub fn push_modifications(&self, mods: Vec<Modification>) {
        self.push_response(ScmResponse::Modifications(mods));
    }

    /// Windows queried so far, in order.
    pub fn queries(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.queries.lock().unwrap().clone()
    }
}

impl SourceControl for FakeSourceControl {
    fn get_modifications<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = ScmResult<Vec<Modification>>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut queries = self.queries.lock().unwrap();
                queries.push((from, to));
            }

            let next = {
                let mut responses = self.responses.lock().unwrap();
                responses.pop_front()
            };

            match next {
                None => Ok(Vec::new()),
                Some(ScmResponse::Modifications(mods)) => Ok(mods),
                Some(ScmResponse::Transient(msg)) => Err(ScmError::Transient(msg)),
                Some(ScmResponse::Fatal(msg)) => Err(ScmError::Fatal(msg)),
            }
        })
    }
}
