//! Process configuration from environment variables.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::cache::CacheConfig;
use crate::domain::StationNumber;
use crate::forecast::ForecastConfig;
use crate::poller::PollerConfig;
use crate::stream::{StreamConfig, StreamError, channel_url};

const ORIGIN: &str = "LINE_MONITOR_ORIGIN";
const WS_PATH: &str = "LINE_MONITOR_WS_PATH";
const LISTEN: &str = "LINE_MONITOR_LISTEN";
const FORECAST_STATIONS: &str = "LINE_MONITOR_FORECAST_STATIONS";
const EXIT_STATION: &str = "LINE_MONITOR_EXIT_STATION";
const POLL_SECS: &str = "LINE_MONITOR_POLL_SECS";
const EXIT_HISTORY: &str = "LINE_MONITOR_EXIT_HISTORY";
const AUTO_RECONNECT: &str = "LINE_MONITOR_AUTO_RECONNECT";
const STALE_SECS: &str = "LINE_MONITOR_STALE_SECS";

/// Configuration errors. Only these abort the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {message}")]
    Invalid {
        var: &'static str,
        value: String,
        message: String,
    },

    #[error("channel endpoint: {0}")]
    Endpoint(#[from] StreamError),
}

/// Everything the binary needs to wire the monitor together.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Backend origin for pull requests.
    pub origin: String,

    /// Push channel URL derived from the origin.
    pub channel_url: Url,

    /// Address of the local JSON boundary.
    pub listen: SocketAddr,

    pub forecast: ForecastConfig,
    pub stream: StreamConfig,
    pub poller: PollerConfig,
    pub cache: CacheConfig,

    /// Age after which the held snapshot is flagged stale.
    pub stale_after: Duration,
}

impl MonitorConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`; unset variables take their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let origin = lookup(ORIGIN).unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
        let ws_path = lookup(WS_PATH).unwrap_or_else(|| "/ws".to_string());
        let channel_url = channel_url(&origin, &ws_path)?;

        let listen: SocketAddr = parse(&lookup, LISTEN, SocketAddr::from(([127, 0, 0, 1], 3000)))?;

        let exit_station = StationNumber::new(parse(&lookup, EXIT_STATION, 40u32)?);
        let stations = match lookup(FORECAST_STATIONS) {
            Some(raw) => parse_stations(&raw)?,
            None => ForecastConfig::default().stations,
        };

        let poll_secs: u64 = parse(&lookup, POLL_SECS, 15)?;
        if poll_secs == 0 {
            return Err(invalid(POLL_SECS, "0", "must be at least one second"));
        }
        let poll_interval = Duration::from_secs(poll_secs);

        let exit_history: usize = parse(&lookup, EXIT_HISTORY, 20)?;
        let auto_reconnect = match lookup(AUTO_RECONNECT) {
            Some(raw) => parse_bool(&raw)?,
            None => true,
        };
        let stale_after = Duration::from_secs(parse(&lookup, STALE_SECS, 30u64)?);

        Ok(Self {
            origin,
            channel_url,
            listen,
            forecast: ForecastConfig::new(stations, exit_station),
            stream: StreamConfig::default().with_auto_reconnect(auto_reconnect),
            poller: PollerConfig::default().with_poll_interval(poll_interval),
            cache: CacheConfig {
                ttl: poll_interval,
                exit_history,
            },
            stale_after,
        })
    }

    pub fn exit_station(&self) -> StationNumber {
        self.forecast.exit_station
    }
}

fn invalid(var: &'static str, value: &str, message: impl Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(var, &raw, e)),
        None => Ok(default),
    }
}

fn parse_stations(raw: &str) -> Result<Vec<StationNumber>, ConfigError> {
    let stations = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map(StationNumber::new)
                .map_err(|e| invalid(FORECAST_STATIONS, raw, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if stations.is_empty() {
        return Err(invalid(FORECAST_STATIONS, raw, "no stations listed"));
    }
    Ok(stations)
}

fn parse_bool(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(AUTO_RECONNECT, raw, "expected true or false")),
    }
}
