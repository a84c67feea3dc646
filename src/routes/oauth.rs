use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{self, CurrentSession},
    error::AppError,
    models::session::SessionData,
    repo,
    services::sessions::new_session_token,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logins", get(login))
        .route("/calling", get(callback))
        .route("/logout", get(logout))
        .route("/secret", get(secret))
        .route("/oauth/token", post(proxy_token))
        .route("/get_user_info", get(user_info))
        .route("/save-user", post(save_user))
}

async fn login(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let token = session.token.unwrap_or_else(new_session_token);
    let oauth_state = Uuid::new_v4().simple().to_string();
    let data = SessionData {
        oauth_state: Some(oauth_state.clone()),
        ..session.data
    };
    state.sessions.set(&token, &data).await?;

    let url = state.oauth.authorize_url(&oauth_state)?;
    Ok((
        auth::apply_session_cookie(jar, &token),
        Redirect::temporary(&url),
    ))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: PrivateCookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(PrivateCookieJar, Json<Value>), AppError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Authorization code is missing"))?;

    let expected = session.data.oauth_state.as_deref();
    if expected.is_none() || expected != query.state.as_deref() {
        warn!("oauth callback with mismatched state");
        return Err(AppError::bad_request("Invalid oauth state"));
    }

    let tokens = state.oauth.exchange_code(&code).await?;
    let user_info = state.oauth.user_info(&tokens.access_token).await?;

    let token = session.token.unwrap_or_else(new_session_token);
    let data = SessionData {
        authenticated: true,
        user_info: Some(user_info.clone()),
        access_token: Some(tokens.access_token),
        oauth_state: None,
    };
    state.sessions.set(&token, &data).await?;
    info!("oauth login for {}", data.user_field("email").unwrap_or("unknown"));

    Ok((auth::apply_session_cookie(jar, &token), Json(user_info)))
}

async fn logout(
    State(state): State<AppState>,
    session: CurrentSession,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let Some(token) = session.token else {
        return Ok((jar, Redirect::temporary("/")));
    };
    state.sessions.destroy(&token).await?;
    info!("session closed");

    let target = match session.data.access_token.as_deref() {
        Some(access_token) => state.oauth.revoke_url(access_token)?,
        None => "/".to_string(),
    };
    Ok((auth::clear_session_cookie(jar), Redirect::temporary(&target)))
}

async fn secret(session: CurrentSession) -> Result<&'static str, AppError> {
    session.require_authenticated()?;
    Ok("Field survey session is active")
}

async fn proxy_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let upstream = state.oauth.proxy_token(body.to_vec(), content_type).await?;

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, Body::from(upstream.body)).into_response();
    if let Some(value) = upstream
        .content_type
        .and_then(|ct| header::HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn user_info(session: CurrentSession) -> Result<Json<Value>, AppError> {
    session
        .data
        .user_info
        .map(Json)
        .ok_or_else(|| AppError::not_found("User info not found in session"))
}

async fn save_user(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<&'static str, AppError> {
    if session.data.user_info.is_none() {
        return Err(AppError::not_found("User info not found in session"));
    }
    let field = |key: &str| {
        session
            .data
            .user_field(key)
            .ok_or_else(|| AppError::bad_request(format!("Invalid {key} in session user info")))
    };
    let (subject, email, name) = (field("sub")?, field("email")?, field("name")?);

    repo::users::upsert_oauth_user(&state.db, subject, email, name).await?;
    info!("saved oauth user {email}");
    Ok("User saved successfully")
}
