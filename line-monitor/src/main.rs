use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use line_monitor::cache::CachedLineClient;
use line_monitor::config::MonitorConfig;
use line_monitor::forecast::ForecastTicker;
use line_monitor::poller::{FallbackPoller, LineClient, LineClientConfig};
use line_monitor::router::MessageRouter;
use line_monitor::store::LineStore;
use line_monitor::stream::{StreamClient, WsConnector};
use line_monitor::web::{AppState, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match MonitorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "line monitor failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let root = CancellationToken::new();
    let store = LineStore::new(config.exit_station()).shared();

    let line_client = LineClient::new(LineClientConfig::new(&config.origin))?;
    let pull = Arc::new(CachedLineClient::new(line_client, &config.cache));
    let poller_wake = Arc::new(Notify::new());

    let (stream, messages) = StreamClient::spawn(
        WsConnector::new(config.channel_url.as_str()),
        config.stream.clone(),
    );
    let router = MessageRouter::new(store.clone(), pull.clone(), poller_wake.clone());
    let router_task = tokio::spawn(router.run(messages, root.child_token()));

    let poller = FallbackPoller::spawn(
        store.clone(),
        pull.clone(),
        config.poller.clone(),
        poller_wake,
        &root,
    );
    let ticker = ForecastTicker::spawn(store.clone(), config.forecast.clone(), &root);

    stream.connect();

    let state = AppState::new(
        store,
        stream.clone(),
        ticker.subscribe(),
        pull,
        config.stale_after,
    );
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!(
        addr = %config.listen,
        channel = %config.channel_url,
        origin = %config.origin,
        "line monitor listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    stream.shutdown().await;
    poller.stop().await;
    ticker.stop().await;
    root.cancel();
    if let Err(e) = router_task.await {
        warn!(error = %e, "message router task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
