use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    models::user::{OAuthUser, User},
};

pub async fn insert_user(
    db: &DbPool,
    username: &str,
    email: &str,
    phone: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as(
        r#"INSERT INTO users (username, email, phone, password_hash, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, username, email, phone, password_hash, created_at"#,
    )
    .bind(username)
    .bind(email)
    .bind(phone)
    .bind(password_hash)
    .bind(Utc::now())
    .fetch_one(db)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("username {username} is already taken"))
        }
        other => AppError::Database(other),
    })?;
    Ok(user)
}

pub async fn find_user_by_username(db: &DbPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as(
        "SELECT id, username, email, phone, password_hash, created_at FROM users WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn update_password(db: &DbPool, user_id: i64, password_hash: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(password_hash)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Inserts the Google account or refreshes its email and name.
pub async fn upsert_oauth_user(
    db: &DbPool,
    subject: &str,
    email: &str,
    name: &str,
) -> Result<OAuthUser, AppError> {
    let user = sqlx::query_as(
        r#"INSERT INTO user_info (subject, email, name, created_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (subject) DO UPDATE SET email = excluded.email, name = excluded.name
        RETURNING id, subject, email, name, created_at"#,
    )
    .bind(subject)
    .bind(email)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(user)
}
