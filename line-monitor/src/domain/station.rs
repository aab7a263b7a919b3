//! Station records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::carrier::CarrierId;
use super::error::SnapshotError;

/// Stable numeric identity of a station.
///
/// The number is printed on the physical bath; it is never an index into
/// any collection, so gaps and arbitrary ordering are expected.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationNumber(u32);

impl StationNumber {
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for StationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Station({})", self.0)
    }
}

impl fmt::Display for StationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StationNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

/// One physical processing point as reported by the backend.
///
/// Timestamps travel as seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_number: StationNumber,

    pub occupied: bool,

    /// Present only while occupied.
    #[serde(default)]
    pub carrier_id: Option<CarrierId>,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub entry_timestamp: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expected_exit_timestamp: Option<DateTime<Utc>>,
}

impl Station {
    /// An empty station.
    pub fn vacant(station_number: StationNumber) -> Self {
        Self {
            station_number,
            occupied: false,
            carrier_id: None,
            entry_timestamp: None,
            expected_exit_timestamp: None,
        }
    }

    /// A station holding `carrier_id` since `entry`, due out at `expected_exit`.
    pub fn occupied_by(
        station_number: StationNumber,
        carrier_id: CarrierId,
        entry: DateTime<Utc>,
        expected_exit: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            station_number,
            occupied: true,
            carrier_id: Some(carrier_id),
            entry_timestamp: Some(entry),
            expected_exit_timestamp: expected_exit,
        }
    }

    /// The carrier currently in this station, if the record is occupied.
    pub fn carrier(&self) -> Option<CarrierId> {
        if self.occupied { self.carrier_id } else { None }
    }

    /// Planned processing time in seconds, when both timestamps are known.
    pub fn planned_duration_secs(&self) -> Option<i64> {
        let entry = self.entry_timestamp?;
        let exit = self.expected_exit_timestamp?;
        Some(exit.signed_duration_since(entry).num_seconds())
    }

    /// Check the occupancy invariant.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        match (self.occupied, self.carrier_id) {
            (false, Some(carrier)) => Err(SnapshotError::VacantWithCarrier {
                station: self.station_number,
                carrier,
            }),
            (true, None) => Err(SnapshotError::OccupiedWithoutCarrier(self.station_number)),
            _ => Ok(()),
        }
    }
}
