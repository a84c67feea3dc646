use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use tracing::{info, warn};

use crate::{
    error::AppError,
    jwt::{self, Claims},
    models::{
        session::SessionData,
        user::{TokenPair, User},
    },
    repo,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "fieldsurvey_session";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn register_user(
    state: &AppState,
    username: &str,
    email: &str,
    phone: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if email.trim().is_empty() {
        return Err(AppError::bad_request("email is required"));
    }

    let hash = hash_password(password)?;
    let user = repo::users::insert_user(&state.db, username, email.trim(), phone.trim(), &hash).await?;
    info!("registered user {}", user.username);
    Ok(user)
}

pub async fn authenticate_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let Some(user) = repo::users::find_user_by_username(&state.db, username).await? else {
        warn!("login attempt for unregistered username {username}");
        return Err(AppError::Unauthorized("Username not registered".into()));
    };
    if !verify_password(password, &user.password_hash) {
        warn!("password mismatch for {username}");
        return Err(AppError::Unauthorized("Invalid password".into()));
    }
    Ok(user)
}

pub async fn change_password(
    state: &AppState,
    username: &str,
    old_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    if new_password.is_empty() {
        return Err(AppError::bad_request("new password must not be empty"));
    }
    let user = repo::users::find_user_by_username(&state.db, username)
        .await?
        .ok_or_else(|| AppError::not_found("Username is not registered"))?;
    if !verify_password(old_password, &user.password_hash) {
        return Err(AppError::Unauthorized("Password invalid".into()));
    }
    let hash = hash_password(new_password)?;
    repo::users::update_password(&state.db, user.id, &hash).await?;
    info!("password changed for {username}");
    Ok(())
}

pub fn issue_token_pair(state: &AppState, username: &str) -> Result<TokenPair, AppError> {
    let claims = Claims::for_user(username);
    let jwt_config = &state.config.jwt;
    Ok(TokenPair {
        access_token: jwt::issue(&claims, &jwt_config.secret, jwt_config.access_token_ttl)?,
        refresh_token: Some(jwt::issue(
            &claims,
            &jwt_config.secret,
            jwt_config.refresh_token_ttl,
        )?),
    })
}

pub fn refresh_access_token(state: &AppState, refresh_token: &str) -> Result<TokenPair, AppError> {
    let jwt_config = &state.config.jwt;
    let claims = jwt::verify(refresh_token, &jwt_config.secret)?;
    Ok(TokenPair {
        access_token: jwt::issue(&claims, &jwt_config.secret, jwt_config.access_token_ttl)?,
        refresh_token: None,
    })
}

pub fn apply_session_cookie(jar: PrivateCookieJar, token: &str) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}

/// The OAuth session attached to the request, if the cookie names one.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession {
    pub token: Option<String>,
    pub data: SessionData,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<axum_extra::extract::cookie::Key>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized("unreadable session cookie".into()))?;

        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(Self::default());
        };
        let data = state.sessions.get(&token).await?.unwrap_or_default();
        Ok(Self {
            token: Some(token),
            data,
        })
    }
}

impl CurrentSession {
    pub fn require_authenticated(&self) -> Result<&SessionData, AppError> {
        if self.data.authenticated {
            Ok(&self.data)
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
