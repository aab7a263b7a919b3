//! Errors raised at the merge boundary of the line state.
//!
//! A snapshot or event that fails any of these checks is rejected as a
//! whole; nothing from it is applied.

use super::carrier::CarrierId;
use super::station::StationNumber;

/// Invariant violations in incoming line data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The same station number appears twice in one snapshot
    #[error("duplicate station {0} in snapshot")]
    DuplicateStation(StationNumber),

    /// An unoccupied station names a carrier
    #[error("station {station} is vacant but names carrier {carrier}")]
    VacantWithCarrier {
        station: StationNumber,
        carrier: CarrierId,
    },

    /// An occupied station has no carrier
    #[error("station {0} is occupied but has no carrier")]
    OccupiedWithoutCarrier(StationNumber),

    /// One carrier reported in two places at once
    #[error("carrier {carrier} reported at stations {first} and {second}")]
    CarrierAtTwoStations {
        carrier: CarrierId,
        first: StationNumber,
        second: StationNumber,
    },

    /// An exit reported somewhere other than the exit station
    #[error("carrier {carrier} exit reported at station {station}, exit station is {exit}")]
    NotExitStation {
        carrier: CarrierId,
        station: StationNumber,
        exit: StationNumber,
    },
}
