//! Remaining-time forecasts for the stations operators watch.
//!
//! Forecasts are never stored: the ticker recomputes them from the current
//! line state once a second and publishes the latest one on a watch channel.

mod config;
mod engine;
mod ticker;

pub use config::ForecastConfig;
pub use engine::{ExitItem, Forecast, ForecastItem, Urgency, compute_forecast};
pub use ticker::{ForecastTicker, forecast_now};
