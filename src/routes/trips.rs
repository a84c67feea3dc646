use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::AppError,
    models::trip::{TripRequest, TripSnapshot, TripState},
    state::AppState,
};

use super::parse_json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start_trip", post(start_trip))
        .route("/end_trip", post(end_trip))
        .route("/get_trip_state", post(get_trip_state))
        .route("/active_trips", get(active_trips))
}

fn username_from(body: &Bytes) -> Result<String, AppError> {
    let request: TripRequest = parse_json(body)?;
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::bad_request("Username is missing in request body"));
    }
    Ok(username.to_string())
}

async fn start_trip(State(state): State<AppState>, body: Bytes) -> Result<&'static str, AppError> {
    let username = username_from(&body)?;
    state.trips.start_trip(&username).await?;
    Ok("Trip started successfully")
}

async fn end_trip(State(state): State<AppState>, body: Bytes) -> Result<&'static str, AppError> {
    let username = username_from(&body)?;
    state.trips.end_trip(&username).await?;
    Ok("Trip ended successfully")
}

async fn get_trip_state(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TripSnapshot>, AppError> {
    let username = username_from(&body)?;
    Ok(Json(state.trips.trip_state(&username).await?))
}

async fn active_trips(State(state): State<AppState>) -> Result<Json<Vec<TripState>>, AppError> {
    Ok(Json(state.trips.active_trips().await?))
}
