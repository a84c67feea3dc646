use axum::{body::Bytes, extract::State, routing::post, Json, Router};

use crate::{
    auth,
    error::AppError,
    models::user::{LoginRequest, PasswordChangeRequest, RefreshRequest, SignupRequest, TokenPair},
    state::AppState,
};

use super::parse_json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/password-changer", post(change_password))
}

async fn sign_up(State(state): State<AppState>, body: Bytes) -> Result<&'static str, AppError> {
    let form: SignupRequest = parse_json(&body)?;
    auth::register_user(&state, &form.username, &form.email, &form.phone, &form.password).await?;
    Ok("Data inserted successfully")
}

async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<TokenPair>, AppError> {
    let form: LoginRequest = parse_json(&body)?;
    let user = auth::authenticate_user(&state, &form.username, &form.password).await?;
    Ok(Json(auth::issue_token_pair(&state, &user.username)?))
}

async fn refresh_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenPair>, AppError> {
    let form: RefreshRequest = parse_json(&body)?;
    Ok(Json(auth::refresh_access_token(&state, &form.refresh_token)?))
}

async fn change_password(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let form: PasswordChangeRequest = parse_json(&body)?;
    auth::change_password(&state, &form.username, &form.old_password, &form.new_password).await?;
    Ok("Password updated successfully")
}
