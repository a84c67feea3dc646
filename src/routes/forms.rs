use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    models::form::{FormSubmission, GpsPoint, NewForm, PoleImages},
    repo,
    services::{
        distance::{self, DailyDistance},
        objects,
    },
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/submit-form",
            post(submit_form).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/user-data", get(all_forms))
        .route("/user-datas", get(forms_for_user))
        .route("/api/data/:id", delete(delete_form))
        .route("/api/gps-data", get(gps_data))
        .route("/api/pole-image", get(pole_image))
        .route("/total-distances", get(total_distances))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request(format!("Failed to parse form data: {err}"))
}

fn parse_coordinate(name: &str, raw: Option<String>) -> Result<f64, AppError> {
    let raw = raw.ok_or_else(|| AppError::bad_request(format!("{name} is required")))?;
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid {name} `{raw}`")))?;
    if !value.is_finite() {
        return Err(AppError::bad_request(format!("invalid {name} `{raw}`")));
    }
    Ok(value)
}

async fn submit_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<&'static str, AppError> {
    let mut form = NewForm::default();
    let (mut latitude, mut longitude) = (None, None);
    let mut pole_image: Option<Vec<u8>> = None;
    let mut extra_images: Vec<Vec<u8>> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "poleimage" | "multipleimages" => {
                let data = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part for a file input left blank.
                if data.is_empty() {
                    continue;
                }
                if name == "poleimage" {
                    pole_image = Some(data.to_vec());
                } else {
                    extra_images.push(data.to_vec());
                }
            }
            _ => {
                let value = field.text().await.map_err(multipart_error)?;
                match name.as_str() {
                    "location" => form.location = value,
                    "latitude" => latitude = Some(value),
                    "longitude" => longitude = Some(value),
                    "selectpole" => form.selectpole = value,
                    "selectpolestatus" => form.selectpolestatus = value,
                    "selectpolelocation" => form.selectpolelocation = value,
                    "description" => form.description = value,
                    "availableisp" => form.availableisp = value,
                    "selectisp" => form.selectisp = value,
                    "username" if !value.trim().is_empty() => {
                        form.username = Some(value.trim().to_string())
                    }
                    _ => {}
                }
            }
        }
    }

    form.latitude = parse_coordinate("latitude", latitude)?;
    form.longitude = parse_coordinate("longitude", longitude)?;

    let bucket = state.config.bucket.as_str();
    if let Some(data) = pole_image {
        let url = objects::upload(state.objects.as_ref(), bucket, &objects::pole_image_key(), data)
            .await?;
        info!("uploaded pole image {url}");
        form.pole_image = Some(url);
    }

    // The first failed upload aborts the submission; earlier uploads stay in the bucket.
    for (index, data) in extra_images.into_iter().enumerate() {
        let key = objects::multiple_image_key(index);
        let url = objects::upload(state.objects.as_ref(), bucket, &key, data)
            .await?;
        form.multiple_images.push(url);
    }

    let id = repo::forms::insert_form(&state.db, &form).await?;
    info!(
        "stored submission {id} with {} extra images",
        form.multiple_images.len()
    );
    Ok("Data inserted successfully")
}

async fn all_forms(State(state): State<AppState>) -> Result<Json<Vec<FormSubmission>>, AppError> {
    Ok(Json(repo::forms::list_forms(&state.db, None).await?))
}

#[derive(Deserialize)]
struct UserQuery {
    username: Option<String>,
}

async fn forms_for_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<FormSubmission>>, AppError> {
    let username = query
        .username
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Missing username parameter"))?;
    Ok(Json(
        repo::forms::list_forms(&state.db, Some(username.trim())).await?,
    ))
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::bad_request("Invalid ID"))
}

async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<&'static str, AppError> {
    let id = parse_id(&id)?;
    repo::forms::delete_form(&state.db, id).await?;
    info!("deleted submission {id}");
    Ok("Data deleted successfully")
}

async fn gps_data(State(state): State<AppState>) -> Result<Json<Vec<GpsPoint>>, AppError> {
    Ok(Json(repo::forms::list_gps_points(&state.db).await?))
}

#[derive(Deserialize)]
struct PoleImageQuery {
    id: Option<String>,
}

async fn pole_image(
    State(state): State<AppState>,
    Query(query): Query<PoleImageQuery>,
) -> Result<Json<PoleImages>, AppError> {
    let raw = query
        .id
        .ok_or_else(|| AppError::bad_request("Missing id parameter"))?;
    let form = repo::forms::get_form(&state.db, parse_id(&raw)?).await?;
    Ok(Json(form.into()))
}

async fn total_distances(
    State(state): State<AppState>,
) -> Result<Json<Vec<DailyDistance>>, AppError> {
    Ok(Json(distance::trailing_week(&state.db, Utc::now()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_must_parse() {
        assert_eq!(parse_coordinate("latitude", Some(" 27.5 ".into())).unwrap(), 27.5);
        assert!(parse_coordinate("latitude", None).is_err());
        assert!(parse_coordinate("latitude", Some("north".into())).is_err());
        assert!(parse_coordinate("latitude", Some("NaN".into())).is_err());
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(AppError::BadRequest(_))));
    }
}
