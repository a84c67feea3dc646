use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};

/// One field survey as stored in `userform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: i64,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub selectpole: String,
    pub selectpolestatus: String,
    pub selectpolelocation: String,
    pub description: String,
    #[serde(rename = "poleimage_url")]
    pub pole_image: Option<String>,
    pub availableisp: String,
    pub selectisp: String,
    #[serde(rename = "multipleimages_urls")]
    pub multiple_images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for FormSubmission {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let raw_images: Option<String> = row.try_get("multipleimages")?;
        let multiple_images = match raw_images.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw).map_err(|err| sqlx::Error::ColumnDecode {
                index: "multipleimages".into(),
                source: Box::new(err),
            })?,
        };

        Ok(Self {
            id: row.try_get("id")?,
            location: row.try_get("location")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            selectpole: row.try_get("selectpole")?,
            selectpolestatus: row.try_get("selectpolestatus")?,
            selectpolelocation: row.try_get("selectpolelocation")?,
            description: row.try_get("description")?,
            pole_image: row.try_get("poleimage")?,
            availableisp: row.try_get("availableisp")?,
            selectisp: row.try_get("selectisp")?,
            multiple_images,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A submission before the gateway assigns `id` and `created_at`.
#[derive(Debug, Clone, Default)]
pub struct NewForm {
    pub username: Option<String>,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub selectpole: String,
    pub selectpolestatus: String,
    pub selectpolelocation: String,
    pub description: String,
    pub pole_image: Option<String>,
    pub availableisp: String,
    pub selectisp: String,
    pub multiple_images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GpsPoint {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct GpsFix {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    #[sqlx(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleImages {
    pub pole_image: Option<String>,
    pub multiple_images: Vec<String>,
}

impl From<FormSubmission> for PoleImages {
    fn from(form: FormSubmission) -> Self {
        Self {
            pole_image: form.pole_image,
            multiple_images: form.multiple_images,
        }
    }
}
