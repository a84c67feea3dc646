use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::session::{Session, SessionData},
};

/// Server-side session state keyed by the token stored in the session cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<SessionData>, AppError>;
    async fn set(&self, token: &str, data: &SessionData) -> Result<(), AppError>;
    async fn destroy(&self, token: &str) -> Result<(), AppError>;
}

pub fn new_session_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Clone)]
pub struct DbSessionStore {
    db: DbPool,
}

impl DbSessionStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn get(&self, token: &str) -> Result<Option<SessionData>, AppError> {
        let session: Option<Session> =
            sqlx::query_as("SELECT id, data, created_at, updated_at FROM sessions WHERE id = ?1")
                .bind(token)
                .fetch_optional(&self.db)
                .await?;
        session
            .map(|s| serde_json::from_str(&s.data).map_err(|err| AppError::Other(err.into())))
            .transpose()
    }

    async fn set(&self, token: &str, data: &SessionData) -> Result<(), AppError> {
        let raw = serde_json::to_string(data).map_err(|err| AppError::Other(err.into()))?;
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO sessions (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT (id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at"#,
        )
        .bind(token)
        .bind(raw)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
