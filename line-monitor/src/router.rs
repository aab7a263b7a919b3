//! Message router: applies decoded push messages to the line store.
//!
//! Runs as its own task draining the stream client's queue, one message at a
//! time, so messages are applied strictly in arrival order. Exit events are
//! the one place push feeds back into pull: they drop the cached recent-exit
//! list and wake the poller to fetch a fresh one.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CachedLineClient;
use crate::domain::SnapshotError;
use crate::store::{MergeOutcome, SharedStore, UpdateSource};
use crate::stream::{MessageKind, StreamMessage};

/// What happened to one routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The store changed.
    Applied,
    /// Older than what the store holds; dropped.
    Stale,
    /// Failed validation; the store is untouched.
    Rejected,
    /// Not a message type the monitor handles.
    Ignored,
}

impl From<MergeOutcome> for RouteOutcome {
    fn from(outcome: MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Applied => RouteOutcome::Applied,
            MergeOutcome::Stale => RouteOutcome::Stale,
        }
    }
}

pub struct MessageRouter {
    store: SharedStore,
    client: Arc<CachedLineClient>,
    poller_wake: Arc<Notify>,
}

impl MessageRouter {
    pub fn new(store: SharedStore, client: Arc<CachedLineClient>, poller_wake: Arc<Notify>) -> Self {
        Self {
            store,
            client,
            poller_wake,
        }
    }

    /// Apply one message.
    pub async fn route(&self, message: StreamMessage) -> RouteOutcome {
        let kind = message.type_name().to_string();

        match message.kind {
            MessageKind::LineState(snapshot) => {
                let result = self
                    .store
                    .write()
                    .await
                    .apply_snapshot(snapshot, UpdateSource::Push);
                merged(&kind, result)
            }
            MessageKind::StationUpdate(update) => {
                let result = self
                    .store
                    .write()
                    .await
                    .apply_station_update(update, UpdateSource::Push);
                merged(&kind, result)
            }
            MessageKind::CarrierExit(event) => {
                let carrier = event.carrier_id;
                let result = self.store.write().await.record_exit(event, message.timestamp);
                let outcome = merged(&kind, result);

                if outcome != RouteOutcome::Rejected {
                    info!(%carrier, "carrier exited");
                    self.client.invalidate_exits().await;
                    self.poller_wake.notify_one();
                }
                outcome
            }
            MessageKind::Status(status) => {
                self.store.write().await.set_link_health(status.link_healthy);
                if !status.link_healthy {
                    warn!("backend reports line link down");
                }
                RouteOutcome::Applied
            }
            MessageKind::Unknown(name) => {
                debug!(kind = %name, "ignoring unhandled message type");
                RouteOutcome::Ignored
            }
        }
    }

    /// Drain `messages` until the queue closes or `cancel` fires.
    pub async fn run(self, mut messages: mpsc::Receiver<StreamMessage>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = messages.recv() => match message {
                    Some(message) => {
                        self.route(message).await;
                    }
                    None => break,
                },
            }
        }
        debug!("message router stopped");
    }
}

fn merged(kind: &str, result: Result<MergeOutcome, SnapshotError>) -> RouteOutcome {
    match result {
        Ok(outcome) => {
            debug!(kind, ?outcome, "message merged");
            outcome.into()
        }
        Err(e) => {
            warn!(kind, error = %e, "rejecting invalid message");
            RouteOutcome::Rejected
        }
    }
}
