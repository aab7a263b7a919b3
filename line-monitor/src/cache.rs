//! Caching layer for pull-only data.
//!
//! The push channel carries occupancy but not the recent-exit history, so
//! that list comes from the backend on request. It is kept under a single
//! key with a TTL matching the poll interval, and dropped whenever an exit
//! event arrives so the next read sees the new exit.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::{ExitRecord, LineSnapshot};
use crate::poller::{LineSource, PollError};

/// Cached recent-exit list, newest first.
type ExitsEntry = Arc<Vec<ExitRecord>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for the cached list.
    pub ttl: Duration,

    /// Number of exits kept.
    pub exit_history: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15),
            exit_history: 20,
        }
    }
}

/// Line source with a cached recent-exit list.
pub struct CachedLineClient {
    source: Arc<dyn LineSource>,
    exits: MokaCache<(), ExitsEntry>,
    exit_history: usize,
}

impl CachedLineClient {
    pub fn new(source: impl LineSource, config: &CacheConfig) -> Self {
        let exits = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(1)
            .build();

        Self {
            source: Arc::new(source),
            exits,
            exit_history: config.exit_history,
        }
    }

    /// Recent exits, from the cache if present.
    pub async fn recent_exits(&self) -> Result<ExitsEntry, PollError> {
        if let Some(cached) = self.exits.get(&()).await {
            return Ok(cached);
        }
        self.refresh_exits().await
    }

    /// Fetch the exit list and replace the cached one.
    ///
    /// On failure the cached list (if any) is left alone.
    pub async fn refresh_exits(&self) -> Result<ExitsEntry, PollError> {
        let exits = self.source.fetch_exits(self.exit_history).await?;
        let entry = Arc::new(exits);
        self.exits.insert((), entry.clone()).await;
        Ok(entry)
    }

    /// Drop the cached exit list.
    pub async fn invalidate_exits(&self) {
        self.exits.invalidate(&()).await;
    }

    /// Fetch a snapshot. Snapshots are never cached.
    pub async fn fetch_snapshot(&self) -> Result<LineSnapshot, PollError> {
        self.source.fetch_snapshot().await
    }

    pub fn exit_history(&self) -> usize {
        self.exit_history
    }
}
