pub mod accounts;
pub mod forms;
pub mod oauth;
pub mod trips;

use axum::{
    body::Bytes,
    http::{header, Method},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::ObjectStoreConfig, error::AppError, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let mut router = Router::new()
        .merge(forms::router())
        .merge(trips::router())
        .merge(accounts::router())
        .merge(oauth::router());

    if let ObjectStoreConfig::Local { root, .. } = &state.config.objects {
        router = router.nest_service("/objects", ServeDir::new(root));
    }

    router
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Lenient JSON body parsing: any content type, 400 on malformed input.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("Failed to parse request body: {err}")))
}
