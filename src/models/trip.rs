use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted trip bookkeeping, one row per username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TripState {
    pub username: String,
    #[serde(rename = "tripStarted")]
    #[sqlx(rename = "trip_started")]
    pub trip_active: bool,
    #[serde(rename = "tripStartTime")]
    #[sqlx(rename = "trip_start_time")]
    pub current_start_time: Option<DateTime<Utc>>,
    #[serde(rename = "tripEndTime")]
    #[sqlx(rename = "trip_end_time")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "originalTripStartTime")]
    #[sqlx(rename = "original_trip_start_time")]
    pub original_start_time: Option<DateTime<Utc>>,
}

/// What `/get_trip_state` reports back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    pub trip_started: bool,
    pub trip_start_time: Option<DateTime<Utc>>,
    pub original_trip_start_time: Option<DateTime<Utc>>,
    /// Milliseconds since the original start; zero while no trip is running.
    #[serde(rename = "elapsedTime")]
    pub elapsed_millis: i64,
}

impl TripSnapshot {
    pub fn at(state: &TripState, now: DateTime<Utc>) -> Self {
        let elapsed_millis = match (state.trip_active, state.original_start_time) {
            (true, Some(original)) => (now - original).num_milliseconds().max(0),
            _ => 0,
        };
        Self {
            trip_started: state.trip_active,
            trip_start_time: state.current_start_time,
            original_trip_start_time: state.original_start_time,
            elapsed_millis,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TripRequest {
    #[serde(default)]
    pub username: String,
}
