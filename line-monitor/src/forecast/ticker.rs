//! Periodic forecast recomputation.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::store::SharedStore;

use super::config::ForecastConfig;
use super::engine::{Forecast, compute_forecast};

/// Compute a forecast from the store's current stations.
pub async fn forecast_now(
    store: &SharedStore,
    config: &ForecastConfig,
    now: DateTime<Utc>,
) -> Forecast {
    let store = store.read().await;
    compute_forecast(store.all_stations(), config, now)
}

/// Background task that recomputes the forecast every tick.
pub struct ForecastTicker {
    latest: watch::Receiver<Forecast>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ForecastTicker {
    /// Start ticking. The task stops when `parent` or [`stop`](Self::stop)
    /// cancels it.
    pub fn spawn(store: SharedStore, config: ForecastConfig, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let (tx, latest) = watch::channel(Forecast::empty(Utc::now()));

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let forecast = forecast_now(&store, &config, Utc::now()).await;
                        trace!(
                            items = forecast.items.len(),
                            overall = ?forecast.overall,
                            "forecast recomputed"
                        );
                        tx.send_replace(forecast);
                    }
                }
            }
            debug!("forecast ticker stopped");
        });

        Self {
            latest,
            cancel,
            task,
        }
    }

    /// The most recent forecast.
    pub fn latest(&self) -> Forecast {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Forecast> {
        self.latest.clone()
    }

    /// Cancel the ticker and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "forecast ticker task failed");
        }
    }
}
