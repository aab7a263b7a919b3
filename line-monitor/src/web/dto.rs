//! Response bodies for the JSON boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Carrier, CarrierId, ExitRecord, Station, StationNumber};
use crate::store::UpdateSource;
use crate::stream::{ConnectionState, StreamClient};

/// Every known station plus freshness information.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationsResponse {
    pub snapshot_at: Option<DateTime<Utc>>,
    pub link_healthy: bool,

    /// True when operators should not trust the view
    pub stale: bool,

    pub last_source: Option<UpdateSource>,
    pub stations: Vec<Station>,
}

#[derive(Debug, Serialize)]
pub struct CarriersResponse {
    pub carriers: Vec<Carrier>,
}

/// Path of one carrier through the line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub carrier_id: CarrierId,
    pub visited_stations: Vec<StationNumber>,
    pub current_station: Option<StationNumber>,
    pub exited_at: Option<DateTime<Utc>>,
}

impl From<&Carrier> for HistoryResponse {
    fn from(carrier: &Carrier) -> Self {
        Self {
            carrier_id: carrier.carrier_id,
            visited_stations: carrier.visited_stations().to_vec(),
            current_station: carrier.current_station(),
            exited_at: carrier.exited_at(),
        }
    }
}

/// Push channel status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub state: ConnectionState,
    pub last_message_type: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl From<&StreamClient> for ConnectionResponse {
    fn from(client: &StreamClient) -> Self {
        let last = client.last_message();
        Self {
            state: client.state(),
            last_message_type: last.as_ref().map(|m| m.type_name().to_string()),
            last_message_at: last.map(|m| m.timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExitsResponse {
    pub exits: Vec<ExitRecord>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn history_from_carrier() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let mut carrier = Carrier::new(CarrierId::new(7), t0);
        carrier.observe_at(StationNumber::new(30), t0);
        carrier.observe_at(StationNumber::new(31), t0);

        let history = HistoryResponse::from(&carrier);
        assert_eq!(history.carrier_id, CarrierId::new(7));
        assert_eq!(
            history.visited_stations,
            vec![StationNumber::new(30), StationNumber::new(31)]
        );
        assert_eq!(history.current_station, Some(StationNumber::new(31)));
        assert_eq!(history.exited_at, None);
    }

    #[test]
    fn stations_response_field_names() {
        let body = StationsResponse {
            snapshot_at: None,
            link_healthy: true,
            stale: true,
            last_source: Some(UpdateSource::Pull),
            stations: vec![Station::vacant(StationNumber::new(30))],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["lastSource"], "pull");
        assert_eq!(json["linkHealthy"], true);
        assert_eq!(json["stations"][0]["stationNumber"], 30);
    }
}
