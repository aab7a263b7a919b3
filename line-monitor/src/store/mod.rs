//! In-memory line state: station occupancy and carrier history.
//!
//! The store is the only shared mutable state in the monitor. Push and pull
//! data go through the same merge rules:
//!
//! - Station occupancy is replaced wholesale by a snapshot, unless the
//!   snapshot is older than the one already held (then it is discarded).
//!   A station updated individually after the snapshot keeps the newer value.
//! - Carrier history is merged: a station is appended to a carrier's visits
//!   only if it is not already the last entry.
//! - Anything that fails validation is rejected before any mutation.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{
    Carrier, CarrierId, ExitEvent, LineSnapshot, SnapshotError, Station, StationNumber,
    StationUpdate,
};

/// Store handle shared between the router, the poller and readers.
pub type SharedStore = Arc<RwLock<LineStore>>;

/// Where the latest applied data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSource {
    Push,
    Pull,
}

/// Result of offering data to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The data was merged.
    Applied,
    /// The data was older than what the store holds and was dropped.
    Stale,
}

#[derive(Debug, Clone)]
struct StationEntry {
    station: Station,
    observed_at: DateTime<Utc>,
}

/// Authoritative view of the line.
#[derive(Debug, Clone)]
pub struct LineStore {
    exit_station: StationNumber,
    stations: BTreeMap<StationNumber, StationEntry>,
    carriers: BTreeMap<CarrierId, Carrier>,
    snapshot_at: Option<DateTime<Utc>>,
    link_healthy: bool,
    last_source: Option<UpdateSource>,
}

impl LineStore {
    /// An empty store for a line whose exit is `exit_station`.
    pub fn new(exit_station: StationNumber) -> Self {
        Self {
            exit_station,
            stations: BTreeMap::new(),
            carriers: BTreeMap::new(),
            snapshot_at: None,
            link_healthy: false,
            last_source: None,
        }
    }

    /// Wrap the store for sharing.
    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn exit_station(&self) -> StationNumber {
        self.exit_station
    }

    /// Timestamp of the snapshot currently held.
    pub fn snapshot_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot_at
    }

    pub fn link_healthy(&self) -> bool {
        self.link_healthy
    }

    pub fn last_source(&self) -> Option<UpdateSource> {
        self.last_source
    }

    /// Every known station in station-number order, occupied or not.
    pub fn all_stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values().map(|entry| &entry.station)
    }

    pub fn station(&self, number: StationNumber) -> Option<&Station> {
        self.stations.get(&number).map(|entry| &entry.station)
    }

    /// Carriers currently at a station.
    pub fn active_carriers(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.values().filter(|c| c.is_active())
    }

    /// Every carrier ever seen, exited ones included.
    pub fn carriers(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.values()
    }

    pub fn carrier(&self, id: CarrierId) -> Option<&Carrier> {
        self.carriers.get(&id)
    }

    /// Visited stations of a carrier, in visit order.
    pub fn station_history(&self, id: CarrierId) -> Option<&[StationNumber]> {
        self.carriers.get(&id).map(|c| c.visited_stations())
    }

    /// Whether the displayed state should be flagged as possibly stale.
    ///
    /// True before any snapshot, while the upstream link is reported down,
    /// or when the held snapshot is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        let Some(at) = self.snapshot_at else {
            return true;
        };
        if !self.link_healthy {
            return true;
        }
        match now.signed_duration_since(at).to_std() {
            Ok(age) => age > max_age,
            // snapshot from the future: clock skew, not staleness
            Err(_) => false,
        }
    }

    /// Merge a full snapshot.
    pub fn apply_snapshot(
        &mut self,
        snapshot: LineSnapshot,
        source: UpdateSource,
    ) -> Result<MergeOutcome, SnapshotError> {
        snapshot.validate()?;

        if let Some(held) = self.snapshot_at
            && snapshot.timestamp < held
        {
            debug!(
                snapshot = %snapshot.timestamp,
                held = %held,
                ?source,
                "discarding out-of-order snapshot"
            );
            return Ok(MergeOutcome::Stale);
        }

        let at = snapshot.timestamp;
        let mut stations: BTreeMap<StationNumber, StationEntry> = snapshot
            .stations
            .into_iter()
            .map(|station| {
                (
                    station.station_number,
                    StationEntry {
                        station,
                        observed_at: at,
                    },
                )
            })
            .collect();

        // Individual updates newer than this snapshot survive it.
        for (number, entry) in &self.stations {
            if entry.observed_at > at {
                stations.insert(*number, entry.clone());
            }
        }
        dedupe_carriers(&mut stations);

        self.stations = stations;
        self.snapshot_at = Some(at);
        self.link_healthy = snapshot.link_healthy;
        self.last_source = Some(source);
        self.reconcile_carriers(at);

        Ok(MergeOutcome::Applied)
    }

    /// Merge a single-station change.
    pub fn apply_station_update(
        &mut self,
        update: StationUpdate,
        source: UpdateSource,
    ) -> Result<MergeOutcome, SnapshotError> {
        update.station.validate()?;

        let number = update.station.station_number;
        let at = update.observed_at;
        let older_than_snapshot = self.snapshot_at.is_some_and(|held| at < held);
        let older_than_station = self
            .stations
            .get(&number)
            .is_some_and(|entry| at < entry.observed_at);
        if older_than_snapshot || older_than_station {
            debug!(station = %number, observed = %at, "discarding out-of-order station update");
            return Ok(MergeOutcome::Stale);
        }

        // A carrier can only be in one place: vacate wherever it was before.
        if let Some(carrier) = update.station.carrier() {
            for entry in self.stations.values_mut() {
                if entry.station.station_number != number && entry.station.carrier() == Some(carrier)
                {
                    entry.station = Station::vacant(entry.station.station_number);
                    entry.observed_at = at;
                }
            }
        }

        self.stations.insert(
            number,
            StationEntry {
                station: update.station,
                observed_at: at,
            },
        );
        self.last_source = Some(source);
        self.reconcile_carriers(at);

        Ok(MergeOutcome::Applied)
    }

    /// Record that a carrier left the line.
    ///
    /// `fallback_at` is used when the event carries no time of its own.
    pub fn record_exit(
        &mut self,
        event: ExitEvent,
        fallback_at: DateTime<Utc>,
    ) -> Result<MergeOutcome, SnapshotError> {
        let station = event.station_number.unwrap_or(self.exit_station);
        if station != self.exit_station {
            return Err(SnapshotError::NotExitStation {
                carrier: event.carrier_id,
                station,
                exit: self.exit_station,
            });
        }

        let at = event.exited_at.unwrap_or(fallback_at);

        // A carrier seen mid-line after this exit has not left yet.
        if let Some(seen_at) = self.last_sighting_on_line(event.carrier_id)
            && at < seen_at
        {
            debug!(
                carrier = %event.carrier_id,
                exited = %at,
                seen = %seen_at,
                "discarding exit older than the carrier's last sighting"
            );
            return Ok(MergeOutcome::Stale);
        }

        let carrier = self
            .carriers
            .entry(event.carrier_id)
            .or_insert_with(|| Carrier::new(event.carrier_id, at));

        if carrier.exited_at().is_some_and(|prev| prev >= at) {
            return Ok(MergeOutcome::Stale);
        }

        carrier.mark_exited(station, at);
        Ok(MergeOutcome::Applied)
    }

    /// When the carrier was last observed at a station other than the exit.
    fn last_sighting_on_line(&self, id: CarrierId) -> Option<DateTime<Utc>> {
        let station = self.carriers.get(&id)?.current_station()?;
        if station == self.exit_station {
            return None;
        }
        self.stations.get(&station).map(|entry| entry.observed_at)
    }

    /// Record upstream link health from a heartbeat.
    pub fn set_link_health(&mut self, healthy: bool) {
        self.link_healthy = healthy;
    }

    /// Bring carrier records in line with current station occupancy.
    fn reconcile_carriers(&mut self, at: DateTime<Utc>) {
        let mut placed: BTreeMap<CarrierId, StationNumber> = BTreeMap::new();

        for entry in self.stations.values() {
            let Some(id) = entry.station.carrier() else {
                continue;
            };
            let station = entry.station.station_number;
            let carrier = self
                .carriers
                .entry(id)
                .or_insert_with(|| Carrier::new(id, entry.observed_at));

            // An exited carrier still hanging at the exit is awaiting pickup,
            // and one seen before its exit is old news.
            if let Some(exited) = carrier.exited_at()
                && (station == self.exit_station || entry.observed_at <= exited)
            {
                continue;
            }

            carrier.observe_at(station, entry.observed_at);
            placed.insert(id, station);
        }

        for carrier in self.carriers.values_mut() {
            if carrier.is_active() && !placed.contains_key(&carrier.carrier_id) {
                carrier.lose_track(at);
            }
        }
    }
}

/// Keep only the most recently observed station for each carrier.
fn dedupe_carriers(stations: &mut BTreeMap<StationNumber, StationEntry>) {
    let mut latest: BTreeMap<CarrierId, (StationNumber, DateTime<Utc>)> = BTreeMap::new();
    let mut vacate = Vec::new();

    for (number, entry) in stations.iter() {
        let Some(carrier) = entry.station.carrier() else {
            continue;
        };
        match latest.get(&carrier) {
            Some(&(_, other_at)) if other_at >= entry.observed_at => vacate.push(*number),
            Some(&(other, _)) => {
                vacate.push(other);
                latest.insert(carrier, (*number, entry.observed_at));
            }
            None => {
                latest.insert(carrier, (*number, entry.observed_at));
            }
        }
    }

    for number in vacate {
        if let Some(entry) = stations.get_mut(&number) {
            entry.station = Station::vacant(number);
        }
    }
}
