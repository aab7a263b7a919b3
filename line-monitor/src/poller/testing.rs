//! In-memory line source for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::domain::{ExitRecord, LineSnapshot};

use super::client::LineSource;
use super::error::PollError;

/// Serves whatever snapshot and exits it was last given, counting calls.
#[derive(Clone, Default)]
pub(crate) struct FakeSource {
    snapshot: Arc<Mutex<Option<LineSnapshot>>>,
    exits: Arc<Mutex<Vec<ExitRecord>>>,
    failing: Arc<AtomicBool>,
    snapshot_calls: Arc<AtomicUsize>,
    exit_calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn set_snapshot(&self, snapshot: LineSnapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    pub fn set_exits(&self, exits: Vec<ExitRecord>) {
        *self.exits.lock().unwrap() = exits;
    }

    /// Make every request fail with a 503 until turned off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn exit_calls(&self) -> usize {
        self.exit_calls.load(Ordering::SeqCst)
    }

    fn unavailable(&self) -> Option<PollError> {
        self.failing.load(Ordering::SeqCst).then(|| PollError::Api {
            status: 503,
            message: "unavailable".into(),
        })
    }
}

impl LineSource for FakeSource {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<LineSnapshot, PollError>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.unavailable() {
            Some(e) => Err(e),
            None => self.snapshot.lock().unwrap().clone().ok_or(PollError::Api {
                status: 404,
                message: "no snapshot yet".into(),
            }),
        };
        async move { result }.boxed()
    }

    fn fetch_exits(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ExitRecord>, PollError>> {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.unavailable() {
            Some(e) => Err(e),
            None => Ok(self.exits.lock().unwrap().iter().take(limit).cloned().collect()),
        };
        async move { result }.boxed()
    }
}
