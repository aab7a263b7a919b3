//! Domain types for the treatment line monitor.
//!
//! Stations (baths) are fixed processing points identified by number;
//! carriers (hangers) move through them in sequence. Snapshots and events
//! arrive from both the push channel and the pull fallback, so every type
//! here is the shared wire shape as well as the in-memory model.

mod carrier;
mod error;
mod snapshot;
mod station;
pub mod time;

pub use carrier::{Carrier, CarrierId};
pub use error::SnapshotError;
pub use snapshot::{ExitEvent, ExitRecord, LineSnapshot, LinkStatus, StationUpdate};
pub use station::{Station, StationNumber};
