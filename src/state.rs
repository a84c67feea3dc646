use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::{AppConfig, ObjectStoreConfig},
    db::{self, DbPool},
    error::AppError,
    services::{
        objects::{LocalObjectStore, MinioObjectStore, ObjectStore},
        oauth::OAuthClient,
        sessions::{DbSessionStore, SessionStore},
        trips::{TripCache, TripTracker},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub objects: Arc<dyn ObjectStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub trips: TripTracker,
    pub oauth: OAuthClient,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        objects: Arc<dyn ObjectStore>,
        sessions: Arc<dyn SessionStore>,
        trips: TripTracker,
        oauth: OAuthClient,
    ) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            config,
            db,
            objects,
            sessions,
            trips,
            oauth,
            cookie_key,
        }
    }
}

impl AppState {
    /// Opens the database, applies migrations and wires every service from `config`.
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let db = db::init_pool(&config.database_url).await?;
        db::migrate(&db).await?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let objects: Arc<dyn ObjectStore> = match &config.objects {
            ObjectStoreConfig::Minio(minio) => {
                Arc::new(MinioObjectStore::new(http.clone(), minio.clone())?)
            }
            ObjectStoreConfig::Local { root, public_base } => {
                Arc::new(LocalObjectStore::new(root.clone(), public_base.clone()))
            }
        };
        let sessions: Arc<dyn SessionStore> = Arc::new(DbSessionStore::new(db.clone()));
        let trips = TripTracker::new(db.clone(), TripCache::new());
        let oauth = OAuthClient::new(http, config.oauth.clone());

        Ok(Self::new(config, db, objects, sessions, trips, oauth))
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
