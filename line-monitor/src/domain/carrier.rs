//! Carrier (hanger) records and their transit history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::station::StationNumber;

/// Identity of one physical carrier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarrierId(u32);

impl CarrierId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Carrier({})", self.0)
    }
}

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One carrier traversing the line.
///
/// `visited_stations` only ever grows. A carrier is never removed once seen;
/// after its exit it stays around for history display with no current station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Carrier {
    pub carrier_id: CarrierId,
    current_station: Option<StationNumber>,
    visited_stations: Vec<StationNumber>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    exited_at: Option<DateTime<Utc>>,
}

impl Carrier {
    /// A carrier seen for the first time at `at`, not yet placed anywhere.
    pub fn new(carrier_id: CarrierId, at: DateTime<Utc>) -> Self {
        Self {
            carrier_id,
            current_station: None,
            visited_stations: Vec::new(),
            first_seen_at: at,
            last_updated_at: at,
            exited_at: None,
        }
    }

    pub fn current_station(&self) -> Option<StationNumber> {
        self.current_station
    }

    /// Stations in visit order.
    pub fn visited_stations(&self) -> &[StationNumber] {
        &self.visited_stations
    }

    pub fn exited_at(&self) -> Option<DateTime<Utc>> {
        self.exited_at
    }

    pub fn is_active(&self) -> bool {
        self.current_station.is_some()
    }

    pub fn has_exited(&self) -> bool {
        self.exited_at.is_some()
    }

    /// Record that the carrier is at `station`.
    ///
    /// The station is appended to the history unless it is already the last
    /// entry, so replaying the same observation is harmless. Returns whether
    /// the history grew.
    pub fn observe_at(&mut self, station: StationNumber, at: DateTime<Utc>) -> bool {
        self.current_station = Some(station);
        self.exited_at = None;
        self.touch(at);
        self.append(station)
    }

    /// The carrier is no longer seen in any station but has not exited.
    pub fn lose_track(&mut self, at: DateTime<Utc>) {
        self.current_station = None;
        self.touch(at);
    }

    /// Terminate the carrier at the exit station.
    pub fn mark_exited(&mut self, exit_station: StationNumber, at: DateTime<Utc>) {
        self.append(exit_station);
        self.current_station = None;
        self.exited_at = Some(at);
        self.touch(at);
    }

    fn append(&mut self, station: StationNumber) -> bool {
        if self.visited_stations.last() == Some(&station) {
            return false;
        }
        self.visited_stations.push(station);
        true
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_updated_at {
            self.last_updated_at = at;
        }
    }
}
