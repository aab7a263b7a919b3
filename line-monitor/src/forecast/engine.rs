//! Forecast computation.
//!
//! Given the full station view and an instant, produce the remaining time
//! for each occupied forecast-relevant station, most urgent first, plus the
//! state of the exit station.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::time::{elapsed_since, remaining};
use crate::domain::{CarrierId, Station, StationNumber};

use super::config::ForecastConfig;

/// How soon a station is expected to free up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

impl Urgency {
    /// Classify a remaining time against the configured thresholds.
    pub fn classify(remaining_secs: u64, config: &ForecastConfig) -> Self {
        if remaining_secs < config.critical_below_secs {
            Urgency::Critical
        } else if remaining_secs < config.warning_below_secs {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }
}

/// Remaining time at one forecast-relevant station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastItem {
    pub station_number: StationNumber,
    pub carrier_id: CarrierId,

    /// `None` when the backend did not give both entry and expected exit.
    pub remaining_seconds: Option<u64>,

    pub urgency: Urgency,
}

/// A carrier waiting at the exit station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitItem {
    pub station_number: StationNumber,
    pub carrier_id: CarrierId,

    /// Time since the carrier arrived at the exit, if its entry is known.
    pub elapsed_seconds: Option<u64>,
}

/// One recomputation of all forecasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ForecastItem>,
    pub exit: Option<ExitItem>,
    pub overall: Urgency,
}

impl Forecast {
    /// A forecast with nothing in it.
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            items: Vec::new(),
            exit: None,
            overall: Urgency::Normal,
        }
    }
}

/// Compute the forecast for `stations` at `now`.
///
/// Vacant stations never appear. Items are ordered soonest-to-exit first,
/// ties broken by station number; stations with unknown timing go last.
/// An occupied exit station forces the overall urgency to critical.
pub fn compute_forecast<'a>(
    stations: impl IntoIterator<Item = &'a Station>,
    config: &ForecastConfig,
    now: DateTime<Utc>,
) -> Forecast {
    let mut items = Vec::new();
    let mut exit = None;

    for station in stations {
        let Some(carrier_id) = station.carrier() else {
            continue;
        };

        if station.station_number == config.exit_station {
            let elapsed = station.entry_timestamp.map(|entry| elapsed_secs(entry, now));
            exit = Some(ExitItem {
                station_number: station.station_number,
                carrier_id,
                elapsed_seconds: elapsed,
            });
            continue;
        }

        if !config.is_relevant(station.station_number) {
            continue;
        }

        let remaining_seconds = remaining_at(station, now);
        let urgency = remaining_seconds
            .map(|secs| Urgency::classify(secs, config))
            .unwrap_or(Urgency::Normal);

        items.push(ForecastItem {
            station_number: station.station_number,
            carrier_id,
            remaining_seconds,
            urgency,
        });
    }

    items.sort_by(compare_items);

    let overall = if exit.is_some() {
        Urgency::Critical
    } else {
        items
            .iter()
            .map(|item| item.urgency)
            .max()
            .unwrap_or(Urgency::Normal)
    };

    Forecast {
        generated_at: now,
        items,
        exit,
        overall,
    }
}

/// Seconds from `entry` to `now`.
///
/// Full timestamps are compared directly so a carrier held over a day does
/// not wrap. An entry stamped after `now` falls back to time of day.
fn elapsed_secs(entry: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let elapsed = (now - entry).num_seconds();
    if elapsed >= 0 {
        elapsed as u64
    } else {
        elapsed_since(entry.time(), now.time()) as u64
    }
}

/// Seconds left at `station`, floored at zero on real elapsed time.
fn remaining_at(station: &Station, now: DateTime<Utc>) -> Option<u64> {
    let entry = station.entry_timestamp?;
    let duration = station.planned_duration_secs().filter(|d| *d > 0)?;

    let elapsed = (now - entry).num_seconds();
    if elapsed >= 0 {
        return Some((duration - elapsed).max(0) as u64);
    }
    remaining(Some(entry.time()), Some(duration), now.time())
}

fn compare_items(a: &ForecastItem, b: &ForecastItem) -> Ordering {
    let by_time = match (a.remaining_seconds, b.remaining_seconds) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.station_number.cmp(&b.station_number))
}
