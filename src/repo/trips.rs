use chrono::{DateTime, Utc};

use crate::{db::DbPool, error::AppError, models::trip::TripState};

const TRIP_COLUMNS: &str =
    "username, trip_started, trip_start_time, trip_end_time, original_trip_start_time";

pub async fn get_trip_state(db: &DbPool, username: &str) -> Result<Option<TripState>, AppError> {
    let state = sqlx::query_as(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE username = ?1"))
        .bind(username)
        .fetch_optional(db)
        .await?;
    Ok(state)
}

/// Marks the trip active unless it already is, keeping any earlier original
/// start. Returns `None` when an active trip blocked the write.
pub async fn begin_trip(
    db: &DbPool,
    username: &str,
    now: DateTime<Utc>,
) -> Result<Option<TripState>, AppError> {
    let state = sqlx::query_as(&format!(
        r#"INSERT INTO trips (username, trip_started, trip_start_time, trip_end_time, original_trip_start_time)
        VALUES (?1, 1, ?2, NULL, ?2)
        ON CONFLICT (username) DO UPDATE SET
            trip_started = 1,
            trip_start_time = excluded.trip_start_time,
            original_trip_start_time =
                COALESCE(trips.original_trip_start_time, excluded.original_trip_start_time)
        WHERE trips.trip_started = 0
        RETURNING {TRIP_COLUMNS}"#
    ))
    .bind(username)
    .bind(now)
    .fetch_optional(db)
    .await?;
    Ok(state)
}

/// Stops an active trip. Returns `None` when no trip was running.
pub async fn finish_trip(
    db: &DbPool,
    username: &str,
    now: DateTime<Utc>,
) -> Result<Option<TripState>, AppError> {
    let state = sqlx::query_as(&format!(
        "UPDATE trips SET trip_started = 0, trip_end_time = ?2 \
         WHERE username = ?1 AND trip_started = 1 RETURNING {TRIP_COLUMNS}"
    ))
    .bind(username)
    .bind(now)
    .fetch_optional(db)
    .await?;
    Ok(state)
}

pub async fn list_active_trip_states(db: &DbPool) -> Result<Vec<TripState>, AppError> {
    let states = sqlx::query_as(&format!(
        "SELECT {TRIP_COLUMNS} FROM trips WHERE trip_started = 1 ORDER BY username"
    ))
    .fetch_all(db)
    .await?;
    Ok(states)
}
