//! Pull fallback.
//!
//! Re-fetches the full snapshot on a fixed interval and merges it with the
//! same rules as push data, so a dead or lossy push channel still leaves the
//! store bounded-stale. An exit event wakes the poller early to refresh the
//! recent-exit list, which the push channel does not carry.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CachedLineClient;
use crate::store::{MergeOutcome, SharedStore, UpdateSource};

pub use client::{LineClient, LineClientConfig, LineSource};
pub use error::PollError;

/// Configuration for the fallback poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between full snapshot fetches.
    pub poll_interval: Duration,
}

impl PollerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// Fetch one snapshot and merge it into the store.
pub async fn poll_once(
    store: &SharedStore,
    client: &CachedLineClient,
) -> Result<MergeOutcome, PollError> {
    let snapshot = client.fetch_snapshot().await?;
    let outcome = store
        .write()
        .await
        .apply_snapshot(snapshot, UpdateSource::Pull)?;
    Ok(outcome)
}

/// Background task running the pull fallback.
pub struct FallbackPoller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FallbackPoller {
    /// Start polling immediately and then every `poll_interval`.
    ///
    /// `wake` is notified by the message router on every exit event.
    /// The poller has its own cancellation token, a child of `parent`.
    pub fn spawn(
        store: SharedStore,
        client: Arc<CachedLineClient>,
        config: PollerConfig,
        wake: Arc<Notify>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        poll_cycle(&store, &client).await;
                        refresh_exits(&client).await;
                    }
                    _ = wake.notified() => {
                        debug!("exit event, refreshing recent exits");
                        refresh_exits(&client).await;
                    }
                }
            }
            info!("fallback poller stopped");
        });

        Self { cancel, task }
    }

    /// Cancel the poller and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "fallback poller task failed");
        }
    }
}

async fn poll_cycle(store: &SharedStore, client: &CachedLineClient) {
    match poll_once(store, client).await {
        Ok(MergeOutcome::Applied) => debug!("pulled snapshot merged"),
        Ok(MergeOutcome::Stale) => debug!("pulled snapshot older than held state"),
        // keep the last known good state
        Err(e) => warn!(error = %e, "snapshot poll failed"),
    }
}

async fn refresh_exits(client: &CachedLineClient) {
    match client.refresh_exits().await {
        Ok(exits) => debug!(count = exits.len(), "recent exits refreshed"),
        Err(e) => warn!(error = %e, "recent exit refresh failed"),
    }
}
