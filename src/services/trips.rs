//! Per-user trip start/stop bookkeeping.
//!
//! The `trips` table is authoritative. [`TripCache`] only remembers the last
//! start seen by this process and may be stale or empty at any time.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    db::DbPool,
    error::AppError,
    models::trip::{TripSnapshot, TripState},
    repo,
};

#[derive(Clone, Default)]
pub struct TripCache {
    starts: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl TripCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, username: &str, started_at: DateTime<Utc>) {
        self.starts
            .lock()
            .await
            .insert(username.to_string(), started_at);
    }

    #[cfg(test)]
    pub async fn get(&self, username: &str) -> Option<DateTime<Utc>> {
        self.starts.lock().await.get(username).copied()
    }

    /// Invalidation hook, called whenever a trip ends.
    pub async fn evict(&self, username: &str) {
        self.starts.lock().await.remove(username);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.starts.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Clone)]
pub struct TripTracker {
    db: DbPool,
    cache: TripCache,
}

impl TripTracker {
    pub fn new(db: DbPool, cache: TripCache) -> Self {
        Self { db, cache }
    }

    pub async fn start_trip(&self, username: &str) -> Result<TripState, AppError> {
        let now = Utc::now();
        let Some(state) = repo::trips::begin_trip(&self.db, username, now).await? else {
            warn!("trip already started for {username}");
            return Err(AppError::Conflict("Trip is already started".into()));
        };
        self.cache.record(username, now).await;

        info!("trip started for {username} at {now}");
        Ok(state)
    }

    pub async fn end_trip(&self, username: &str) -> Result<TripState, AppError> {
        let now = Utc::now();
        let state = repo::trips::finish_trip(&self.db, username, now)
            .await?
            .ok_or_else(|| AppError::Conflict("No trip in progress".into()))?;
        self.cache.evict(username).await;

        info!("trip ended for {username} at {now}");
        Ok(state)
    }

    pub async fn trip_state(&self, username: &str) -> Result<TripSnapshot, AppError> {
        let state = repo::trips::get_trip_state(&self.db, username)
            .await?
            .ok_or_else(|| AppError::not_found("No trip data found"))?;
        Ok(TripSnapshot::at(&state, Utc::now()))
    }

    pub async fn active_trips(&self) -> Result<Vec<TripState>, AppError> {
        repo::trips::list_active_trip_states(&self.db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn tracker() -> (TempDir, TripTracker) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("trips.sqlite").display());
        let db = crate::db::init_pool(&url).await.unwrap();
        crate::db::migrate(&db).await.unwrap();
        (dir, TripTracker::new(db, TripCache::new()))
    }

    #[tokio::test]
    async fn ending_a_trip_evicts_the_cache() {
        let (_dir, tracker) = tracker().await;
        let started = tracker.start_trip("ram").await.unwrap();
        assert_eq!(
            tracker.cache.get("ram").await,
            started.current_start_time
        );

        tracker.end_trip("ram").await.unwrap();
        assert_eq!(tracker.cache.get("ram").await, None);
    }

    #[tokio::test]
    async fn restart_keeps_original_start_and_last_end() {
        let (_dir, tracker) = tracker().await;
        let first = tracker.start_trip("ram").await.unwrap();
        let ended = tracker.end_trip("ram").await.unwrap();
        let second = tracker.start_trip("ram").await.unwrap();

        assert_eq!(second.original_start_time, first.original_start_time);
        assert_eq!(second.end_time, ended.end_time);
        assert!(second.trip_active);
    }

    #[tokio::test]
    async fn transitions_conflict_on_wrong_state() {
        let (_dir, tracker) = tracker().await;
        assert!(matches!(
            tracker.end_trip("ram").await,
            Err(AppError::Conflict(_))
        ));
        tracker.start_trip("ram").await.unwrap();
        assert!(matches!(
            tracker.start_trip("ram").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_admit_one() {
        let (_dir, tracker) = tracker().await;
        for round in 0..10 {
            let username = format!("rider-{round}");
            let attempts: Vec<_> = (0..8)
                .map(|_| {
                    let tracker = tracker.clone();
                    let username = username.clone();
                    tokio::spawn(async move { tracker.start_trip(&username).await })
                })
                .collect();

            let mut started = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(_) => started += 1,
                    Err(AppError::Conflict(_)) => {}
                    Err(err) => panic!("unexpected error: {err:?}"),
                }
            }
            assert_eq!(started, 1, "{username}");
        }
    }

    #[tokio::test]
    async fn cache_records_and_evicts() {
        let cache = TripCache::new();
        let now = Utc::now();
        cache.record("ram", now).await;
        assert_eq!(cache.get("ram").await, Some(now));

        cache.evict("ram").await;
        assert_eq!(cache.get("ram").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn cache_clones_share_entries() {
        let cache = TripCache::new();
        let handle = cache.clone();
        handle.record("sita", Utc::now()).await;
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn inactive_snapshot_reports_zero_elapsed() {
        let start = Utc::now() - chrono::Duration::minutes(5);
        let state = TripState {
            username: "hari".into(),
            trip_active: false,
            current_start_time: Some(start),
            end_time: Some(Utc::now()),
            original_start_time: Some(start),
        };
        assert_eq!(TripSnapshot::at(&state, Utc::now()).elapsed_millis, 0);
    }

    #[test]
    fn active_snapshot_counts_from_original_start() {
        let original = Utc::now() - chrono::Duration::minutes(30);
        let current = Utc::now() - chrono::Duration::minutes(1);
        let state = TripState {
            username: "hari".into(),
            trip_active: true,
            current_start_time: Some(current),
            end_time: None,
            original_start_time: Some(original),
        };
        let now = Utc::now();
        let snapshot = TripSnapshot::at(&state, now);
        assert_eq!(snapshot.elapsed_millis, (now - original).num_milliseconds());
        assert!(snapshot.elapsed_millis >= 30 * 60 * 1000);
    }
}
