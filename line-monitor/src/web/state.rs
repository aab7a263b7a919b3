//! Application state for the web layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::cache::CachedLineClient;
use crate::forecast::Forecast;
use crate::store::SharedStore;
use crate::stream::StreamClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,

    /// Push channel handle, for state and manual reconnects
    pub stream: StreamClient,

    /// Latest forecast from the ticker
    pub forecast: watch::Receiver<Forecast>,

    /// Pull client with the cached recent-exit list
    pub exits: Arc<CachedLineClient>,

    /// Snapshot age after which views are flagged stale
    pub stale_after: Duration,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        stream: StreamClient,
        forecast: watch::Receiver<Forecast>,
        exits: Arc<CachedLineClient>,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            stream,
            forecast,
            exits,
            stale_after,
        }
    }
}
