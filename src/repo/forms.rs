use chrono::{DateTime, Utc};

use crate::{
    db::DbPool,
    error::AppError,
    models::form::{FormSubmission, GpsFix, GpsPoint, NewForm},
};

const FORM_COLUMNS: &str = "uf.id AS id, uf.location AS location, uf.latitude AS latitude, \
     uf.longitude AS longitude, uf.selectpole AS selectpole, \
     uf.selectpolestatus AS selectpolestatus, uf.selectpolelocation AS selectpolelocation, \
     uf.description AS description, uf.poleimage AS poleimage, \
     uf.availableisp AS availableisp, uf.selectisp AS selectisp, \
     uf.multipleimages AS multipleimages, uf.created_at AS created_at";

pub async fn insert_form(db: &DbPool, form: &NewForm) -> Result<i64, AppError> {
    let images =
        serde_json::to_string(&form.multiple_images).map_err(|err| AppError::Other(err.into()))?;

    let user_id: Option<i64> = match form.username.as_deref() {
        Some(username) => sqlx::query_scalar("SELECT id FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(db)
            .await?,
        None => None,
    };

    let id = sqlx::query_scalar(
        r#"INSERT INTO userform (
            user_id, location, latitude, longitude, selectpole, selectpolestatus,
            selectpolelocation, description, poleimage, availableisp, selectisp,
            multipleimages, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        RETURNING id"#,
    )
    .bind(user_id)
    .bind(&form.location)
    .bind(form.latitude)
    .bind(form.longitude)
    .bind(&form.selectpole)
    .bind(&form.selectpolestatus)
    .bind(&form.selectpolelocation)
    .bind(&form.description)
    .bind(form.pole_image.as_deref())
    .bind(&form.availableisp)
    .bind(&form.selectisp)
    .bind(images)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;
    Ok(id)
}

/// All submissions, or only those owned by `username` when given.
pub async fn list_forms(
    db: &DbPool,
    username: Option<&str>,
) -> Result<Vec<FormSubmission>, AppError> {
    let rows = match username {
        Some(username) => {
            sqlx::query_as(&format!(
                "SELECT {FORM_COLUMNS} FROM userform uf JOIN users u ON uf.user_id = u.id \
                 WHERE u.username = ?1 ORDER BY uf.id"
            ))
            .bind(username)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as(&format!("SELECT {FORM_COLUMNS} FROM userform uf ORDER BY uf.id"))
                .fetch_all(db)
                .await?
        }
    };
    Ok(rows)
}

pub async fn get_form(db: &DbPool, id: i64) -> Result<FormSubmission, AppError> {
    sqlx::query_as(&format!("SELECT {FORM_COLUMNS} FROM userform uf WHERE uf.id = ?1"))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no submission with id {id}")))
}

pub async fn delete_form(db: &DbPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM userform WHERE id = ?1")
        .bind(id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("no submission with id {id}")));
    }
    Ok(())
}

pub async fn list_gps_points(db: &DbPool) -> Result<Vec<GpsPoint>, AppError> {
    let points = sqlx::query_as("SELECT id, latitude, longitude FROM userform ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(points)
}

/// Fixes stamped in `[start, end)`, oldest first.
pub async fn gps_fixes_in_window(
    db: &DbPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<GpsFix>, AppError> {
    let fixes = sqlx::query_as(
        "SELECT id, latitude, longitude, created_at FROM userform \
         WHERE created_at >= ?1 AND created_at < ?2 ORDER BY created_at, id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(db)
    .await?;
    Ok(fixes)
}
