//! Snapshots and events exchanged with the backend.
//!
//! The same shapes arrive over the push channel and from the pull
//! fallback, so they merge into the store identically.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::carrier::CarrierId;
use super::error::SnapshotError;
use super::station::{Station, StationNumber};

/// Every station's state at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Whether the backend's link to the line controller is up.
    #[serde(default = "default_link_healthy")]
    pub link_healthy: bool,

    pub stations: Vec<Station>,
}

fn default_link_healthy() -> bool {
    true
}

impl LineSnapshot {
    pub fn new(timestamp: DateTime<Utc>, stations: Vec<Station>) -> Self {
        Self {
            timestamp,
            link_healthy: true,
            stations,
        }
    }

    /// Check every station and the cross-station invariants.
    ///
    /// Rejects duplicate station numbers and a carrier reported in two
    /// stations at once.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen_stations = HashSet::with_capacity(self.stations.len());
        let mut seen_carriers: HashMap<CarrierId, StationNumber> = HashMap::new();

        for station in &self.stations {
            station.validate()?;

            if !seen_stations.insert(station.station_number) {
                return Err(SnapshotError::DuplicateStation(station.station_number));
            }

            if let Some(carrier) = station.carrier()
                && let Some(first) = seen_carriers.insert(carrier, station.station_number)
            {
                return Err(SnapshotError::CarrierAtTwoStations {
                    carrier,
                    first,
                    second: station.station_number,
                });
            }
        }

        Ok(())
    }
}

/// A single station changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationUpdate {
    pub station: Station,
    pub observed_at: DateTime<Utc>,
}

/// A carrier left the line.
///
/// The backend may omit the station (it is always the exit station) and the
/// time (the envelope timestamp is used instead).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitEvent {
    pub carrier_id: CarrierId,

    #[serde(default)]
    pub station_number: Option<StationNumber>,

    #[serde(default)]
    pub exited_at: Option<DateTime<Utc>>,
}

/// One entry of the recent-exit history served by the pull fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRecord {
    pub carrier_id: CarrierId,
    pub station_number: StationNumber,
    pub exited_at: DateTime<Utc>,
}

/// Heartbeat payload describing the upstream link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    pub link_healthy: bool,
}
