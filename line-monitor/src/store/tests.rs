//! Reconciliation tests for the line store.

use super::*;
use chrono::TimeZone;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn st(n: u32) -> StationNumber {
    StationNumber::new(n)
}

fn cid(n: u32) -> CarrierId {
    CarrierId::new(n)
}

fn busy(n: u32, carrier: u32, entered: i64) -> Station {
    Station::occupied_by(st(n), cid(carrier), at(entered), Some(at(entered + 600)))
}

fn snapshot(secs: i64, stations: Vec<Station>) -> LineSnapshot {
    LineSnapshot::new(at(secs), stations)
}

fn store() -> LineStore {
    LineStore::new(st(40))
}

fn numbers(stations: &[StationNumber]) -> Vec<u32> {
    stations.iter().map(|s| s.get()).collect()
}

#[test]
fn empty_store_is_stale() {
    let store = store();
    assert!(store.is_stale(at(0), Duration::from_secs(30)));
    assert_eq!(store.all_stations().count(), 0);
    assert_eq!(store.active_carriers().count(), 0);
}

#[test]
fn snapshot_populates_stations_and_carriers() {
    let mut store = store();
    let outcome = store
        .apply_snapshot(
            snapshot(10, vec![busy(1, 7, 5), Station::vacant(st(2)), busy(3, 8, 8)]),
            UpdateSource::Push,
        )
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Applied);
    assert_eq!(store.all_stations().count(), 3);
    let active: Vec<_> = store.active_carriers().map(|c| c.carrier_id).collect();
    assert_eq!(active, vec![cid(7), cid(8)]);
    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![1]);
    assert_eq!(store.snapshot_at(), Some(at(10)));
    assert_eq!(store.last_source(), Some(UpdateSource::Push));
    assert!(store.link_healthy());
}

#[test]
fn all_stations_ordered_by_number() {
    let mut store = store();
    store
        .apply_snapshot(
            snapshot(1, vec![Station::vacant(st(31)), Station::vacant(st(2)), Station::vacant(st(10))]),
            UpdateSource::Pull,
        )
        .unwrap();

    let order: Vec<_> = store.all_stations().map(|s| s.station_number.get()).collect();
    assert_eq!(order, vec![2, 10, 31]);
}

#[test]
fn replaying_snapshot_does_not_duplicate_history() {
    let mut store = store();
    let snap = snapshot(10, vec![busy(1, 7, 5)]);

    store.apply_snapshot(snap.clone(), UpdateSource::Push).unwrap();
    store.apply_snapshot(snap.clone(), UpdateSource::Push).unwrap();
    store.apply_snapshot(snap, UpdateSource::Pull).unwrap();

    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![1]);
}

#[test]
fn unchanged_state_in_newer_snapshot_does_not_duplicate_history() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(1, 7, 5)]), UpdateSource::Push).unwrap();
    store.apply_snapshot(snapshot(20, vec![busy(1, 7, 5)]), UpdateSource::Pull).unwrap();

    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![1]);
    assert_eq!(store.snapshot_at(), Some(at(20)));
}

#[test]
fn history_follows_carrier_through_line() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(1, 7, 5)]), UpdateSource::Push).unwrap();
    store
        .apply_snapshot(snapshot(20, vec![Station::vacant(st(1)), busy(2, 7, 15)]), UpdateSource::Push)
        .unwrap();
    store
        .apply_snapshot(snapshot(30, vec![Station::vacant(st(2)), busy(30, 7, 25)]), UpdateSource::Push)
        .unwrap();

    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![1, 2, 30]);
    assert_eq!(store.carrier(cid(7)).unwrap().current_station(), Some(st(30)));
}

#[test]
fn older_snapshot_is_discarded_without_mutation() {
    let mut store = store();
    store.apply_snapshot(snapshot(20, vec![busy(2, 7, 15)]), UpdateSource::Push).unwrap();
    let before: Vec<Station> = store.all_stations().cloned().collect();

    let outcome = store
        .apply_snapshot(snapshot(10, vec![busy(1, 7, 5), busy(3, 9, 5)]), UpdateSource::Pull)
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Stale);
    let after: Vec<Station> = store.all_stations().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![2]);
    assert!(store.carrier(cid(9)).is_none());
    assert_eq!(store.snapshot_at(), Some(at(20)));
    assert_eq!(store.last_source(), Some(UpdateSource::Push));
}

#[test]
fn invalid_snapshot_is_rejected_whole() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(1, 7, 5)]), UpdateSource::Push).unwrap();

    let bad = snapshot(20, vec![busy(2, 8, 15), busy(2, 9, 15)]);
    let err = store.apply_snapshot(bad, UpdateSource::Push).unwrap_err();

    assert_eq!(err, SnapshotError::DuplicateStation(st(2)));
    assert_eq!(store.snapshot_at(), Some(at(10)));
    assert!(store.carrier(cid(8)).is_none());
    assert_eq!(store.station(st(1)).unwrap().carrier(), Some(cid(7)));
}

#[test]
fn snapshot_replaces_occupancy_wholesale() {
    let mut store = store();
    store
        .apply_snapshot(snapshot(10, vec![busy(1, 7, 5), busy(2, 8, 5)]), UpdateSource::Push)
        .unwrap();
    store.apply_snapshot(snapshot(20, vec![busy(3, 9, 15)]), UpdateSource::Pull).unwrap();

    let stations: Vec<_> = store.all_stations().map(|s| s.station_number.get()).collect();
    assert_eq!(stations, vec![3]);

    // carriers that vanished are kept but no longer active
    let active: Vec<_> = store.active_carriers().map(|c| c.carrier_id).collect();
    assert_eq!(active, vec![cid(9)]);
    let gone = store.carrier(cid(7)).unwrap();
    assert_eq!(gone.current_station(), None);
    assert!(!gone.has_exited());
    assert_eq!(numbers(gone.visited_stations()), vec![1]);
}

#[test]
fn link_health_comes_from_snapshot_and_heartbeat() {
    let mut store = store();
    let mut snap = snapshot(10, vec![]);
    snap.link_healthy = false;
    store.apply_snapshot(snap, UpdateSource::Push).unwrap();
    assert!(!store.link_healthy());
    assert!(store.is_stale(at(11), Duration::from_secs(30)));

    store.set_link_health(true);
    assert!(store.link_healthy());
    assert!(!store.is_stale(at(11), Duration::from_secs(30)));
}

#[test]
fn staleness_by_age() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![]), UpdateSource::Push).unwrap();

    assert!(!store.is_stale(at(40), Duration::from_secs(30)));
    assert!(store.is_stale(at(41), Duration::from_secs(30)));
    assert!(!store.is_stale(at(5), Duration::from_secs(30)));
}

#[test]
fn station_update_moves_carrier() {
    let mut store = store();
    store
        .apply_snapshot(snapshot(10, vec![busy(1, 7, 5), Station::vacant(st(2))]), UpdateSource::Push)
        .unwrap();

    let outcome = store
        .apply_station_update(
            StationUpdate {
                station: busy(2, 7, 12),
                observed_at: at(12),
            },
            UpdateSource::Push,
        )
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Applied);
    assert_eq!(store.station(st(1)).unwrap().carrier(), None);
    assert_eq!(store.station(st(2)).unwrap().carrier(), Some(cid(7)));
    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![1, 2]);
}

#[test]
fn station_update_older_than_snapshot_is_stale() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(1, 7, 5)]), UpdateSource::Push).unwrap();

    let outcome = store
        .apply_station_update(
            StationUpdate {
                station: Station::vacant(st(1)),
                observed_at: at(9),
            },
            UpdateSource::Push,
        )
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Stale);
    assert_eq!(store.station(st(1)).unwrap().carrier(), Some(cid(7)));
}

#[test]
fn newer_station_update_survives_older_snapshot_replacement() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![Station::vacant(st(1))]), UpdateSource::Push).unwrap();
    store
        .apply_station_update(
            StationUpdate {
                station: busy(1, 7, 14),
                observed_at: at(15),
            },
            UpdateSource::Push,
        )
        .unwrap();

    // snapshot taken between the two still lists station 1 as vacant
    store
        .apply_snapshot(snapshot(12, vec![Station::vacant(st(1)), Station::vacant(st(2))]), UpdateSource::Pull)
        .unwrap();

    assert_eq!(store.station(st(1)).unwrap().carrier(), Some(cid(7)));
    assert!(store.station(st(2)).is_some());
    assert!(store.carrier(cid(7)).unwrap().is_active());
}

#[test]
fn newer_snapshot_dominates_earlier_station_update() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![Station::vacant(st(1))]), UpdateSource::Push).unwrap();
    store
        .apply_station_update(
            StationUpdate {
                station: busy(1, 7, 11),
                observed_at: at(11),
            },
            UpdateSource::Push,
        )
        .unwrap();
    store.apply_snapshot(snapshot(20, vec![busy(2, 7, 18)]), UpdateSource::Push).unwrap();

    assert!(store.station(st(1)).is_none());
    assert_eq!(store.station(st(2)).unwrap().carrier(), Some(cid(7)));
    assert_eq!(numbers(store.station_history(cid(7)).unwrap()), vec![1, 2]);
}

#[test]
fn invalid_station_update_is_rejected() {
    let mut store = store();
    let mut station = Station::vacant(st(3));
    station.occupied = true;

    let err = store
        .apply_station_update(
            StationUpdate {
                station,
                observed_at: at(1),
            },
            UpdateSource::Push,
        )
        .unwrap_err();

    assert_eq!(err, SnapshotError::OccupiedWithoutCarrier(st(3)));
    assert!(store.station(st(3)).is_none());
}

#[test]
fn exit_terminates_carrier_but_keeps_it() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(32, 7, 5)]), UpdateSource::Push).unwrap();

    let outcome = store
        .record_exit(
            ExitEvent {
                carrier_id: cid(7),
                station_number: Some(st(40)),
                exited_at: Some(at(20)),
            },
            at(99),
        )
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Applied);
    let carrier = store.carrier(cid(7)).unwrap();
    assert!(carrier.has_exited());
    assert_eq!(carrier.exited_at(), Some(at(20)));
    assert_eq!(numbers(carrier.visited_stations()), vec![32, 40]);
    assert_eq!(store.active_carriers().count(), 0);
}

#[test]
fn exit_without_time_uses_fallback() {
    let mut store = store();
    store
        .record_exit(
            ExitEvent {
                carrier_id: cid(3),
                station_number: None,
                exited_at: None,
            },
            at(50),
        )
        .unwrap();

    let carrier = store.carrier(cid(3)).unwrap();
    assert_eq!(carrier.exited_at(), Some(at(50)));
    assert_eq!(numbers(carrier.visited_stations()), vec![40]);
}

#[test]
fn duplicate_exit_is_stale() {
    let mut store = store();
    let event = ExitEvent {
        carrier_id: cid(3),
        station_number: None,
        exited_at: Some(at(50)),
    };
    store.record_exit(event.clone(), at(50)).unwrap();

    assert_eq!(store.record_exit(event, at(60)).unwrap(), MergeOutcome::Stale);
    assert_eq!(numbers(store.station_history(cid(3)).unwrap()), vec![40]);
}

#[test]
fn exit_older_than_latest_sighting_is_stale() {
    let mut store = store();
    store.apply_snapshot(snapshot(100, vec![busy(12, 7, 95)]), UpdateSource::Push).unwrap();

    let outcome = store
        .record_exit(
            ExitEvent {
                carrier_id: cid(7),
                station_number: None,
                exited_at: Some(at(50)),
            },
            at(50),
        )
        .unwrap();

    assert_eq!(outcome, MergeOutcome::Stale);
    let carrier = store.carrier(cid(7)).unwrap();
    assert!(carrier.is_active());
    assert!(!carrier.has_exited());
    assert_eq!(carrier.current_station(), Some(st(12)));
    assert_eq!(numbers(carrier.visited_stations()), vec![12]);
}

#[test]
fn exit_at_other_station_is_rejected() {
    let mut store = store();
    let err = store
        .record_exit(
            ExitEvent {
                carrier_id: cid(3),
                station_number: Some(st(12)),
                exited_at: None,
            },
            at(1),
        )
        .unwrap_err();

    assert!(matches!(err, SnapshotError::NotExitStation { .. }));
    assert!(store.carrier(cid(3)).is_none());
}

#[test]
fn exited_carrier_awaiting_pickup_stays_exited() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(40, 7, 8)]), UpdateSource::Push).unwrap();
    store
        .record_exit(
            ExitEvent {
                carrier_id: cid(7),
                station_number: None,
                exited_at: Some(at(12)),
            },
            at(12),
        )
        .unwrap();

    // still hanging at the exit in the next snapshot
    store.apply_snapshot(snapshot(20, vec![busy(40, 7, 8)]), UpdateSource::Push).unwrap();

    let carrier = store.carrier(cid(7)).unwrap();
    assert!(carrier.has_exited());
    assert!(!carrier.is_active());
    assert_eq!(store.station(st(40)).unwrap().carrier(), Some(cid(7)));
}

#[test]
fn snapshot_from_before_exit_does_not_revive_carrier() {
    let mut store = store();
    store.apply_snapshot(snapshot(10, vec![busy(32, 7, 5)]), UpdateSource::Push).unwrap();
    store
        .record_exit(
            ExitEvent {
                carrier_id: cid(7),
                station_number: None,
                exited_at: Some(at(30)),
            },
            at(30),
        )
        .unwrap();

    // newer than the held snapshot, older than the exit
    store.apply_snapshot(snapshot(20, vec![busy(32, 7, 5)]), UpdateSource::Pull).unwrap();

    assert!(store.carrier(cid(7)).unwrap().has_exited());
    assert_eq!(store.active_carriers().count(), 0);
}

#[test]
fn carrier_reentering_after_exit_is_active_again() {
    let mut store = store();
    store
        .record_exit(
            ExitEvent {
                carrier_id: cid(7),
                station_number: None,
                exited_at: Some(at(10)),
            },
            at(10),
        )
        .unwrap();
    store.apply_snapshot(snapshot(50, vec![busy(1, 7, 45)]), UpdateSource::Push).unwrap();

    let carrier = store.carrier(cid(7)).unwrap();
    assert!(carrier.is_active());
    assert!(!carrier.has_exited());
    assert_eq!(numbers(carrier.visited_stations()), vec![40, 1]);
}

#[test]
fn unknown_carrier_history_is_none() {
    assert!(store().station_history(cid(1)).is_none());
}

#[tokio::test]
async fn shared_store_is_usable_across_tasks() {
    let shared = store().shared();
    let writer = shared.clone();

    tokio::spawn(async move {
        writer
            .write()
            .await
            .apply_snapshot(snapshot(1, vec![busy(1, 2, 0)]), UpdateSource::Pull)
            .unwrap();
    })
    .await
    .unwrap();

    assert_eq!(shared.read().await.active_carriers().count(), 1);
}
