//! HS256 access/refresh tokens. Pure functions, no HTTP or database involved.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    /// Expiry as seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    pub fn for_user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            exp: 0,
        }
    }
}

/// Signs `claims` with `exp` set to now + `ttl`.
pub fn issue(claims: &Claims, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let ttl = i64::try_from(ttl.as_secs())
        .map_err(|_| AppError::Config("token ttl out of range".into()))?;
    let exp = Utc::now()
        .timestamp()
        .checked_add(ttl)
        .ok_or_else(|| AppError::Config("token ttl out of range".into()))?;
    let claims = Claims {
        exp,
        ..claims.clone()
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AppError::Other(err.into()))
}

pub fn verify(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| AppError::Unauthorized(format!("Invalid token: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies() {
        let token = issue(&Claims::for_user("ram"), SECRET, Duration::from_secs(60)).unwrap();
        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.username, "ram");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue(&Claims::for_user("ram"), SECRET, Duration::from_secs(60)).unwrap();
        assert!(matches!(
            verify(&token, "other-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            username: "ram".into(),
            exp: Utc::now().timestamp() - 10,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(verify(&token, SECRET).is_err());
    }

    #[test]
    fn oversized_ttl_is_refused() {
        let ttl = Duration::from_secs(i64::MAX as u64);
        assert!(matches!(
            issue(&Claims::for_user("ram"), SECRET, ttl),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify("not.a.jwt", SECRET).is_err());
    }
}
