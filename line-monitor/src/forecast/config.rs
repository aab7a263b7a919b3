//! Forecast configuration.

use std::time::Duration;

use crate::domain::StationNumber;

/// Which stations to forecast and how to classify them.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Forecast-relevant stations (the ones before the exit).
    pub stations: Vec<StationNumber>,

    /// Station after which a carrier has left the line.
    pub exit_station: StationNumber,

    /// Remaining time strictly below this is critical.
    pub critical_below_secs: u64,

    /// Remaining time strictly below this is a warning.
    pub warning_below_secs: u64,

    /// Recompute interval.
    pub tick: Duration,
}

impl ForecastConfig {
    /// Create a config for the given stations with default thresholds.
    pub fn new(stations: impl IntoIterator<Item = StationNumber>, exit_station: StationNumber) -> Self {
        Self {
            stations: stations.into_iter().collect(),
            exit_station,
            ..Self::default()
        }
    }

    /// Set the urgency thresholds.
    pub fn with_thresholds(mut self, critical_below_secs: u64, warning_below_secs: u64) -> Self {
        self.critical_below_secs = critical_below_secs;
        self.warning_below_secs = warning_below_secs;
        self
    }

    /// Set the recompute interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn is_relevant(&self, station: StationNumber) -> bool {
        self.stations.contains(&station)
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            stations: vec![
                StationNumber::new(30),
                StationNumber::new(31),
                StationNumber::new(32),
            ],
            exit_station: StationNumber::new(40),
            critical_below_secs: 60,
            warning_below_secs: 300,
            tick: Duration::from_secs(1),
        }
    }
}
