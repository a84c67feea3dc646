//! Daily travelled distance over the trailing week.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::{db::DbPool, error::AppError, models::form::GpsFix, repo};

pub const WINDOW_DAYS: i64 = 7;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two `(lat, lon)` pairs given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDistance {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    /// `None` when the day has fewer than two fixes.
    #[serde(rename = "distance")]
    pub distance_km: Option<f64>,
}

fn serialize_date<S: serde::Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&date.format("%Y-%m-%d").to_string())
}

/// Sums segment lengths between consecutive same-day fixes and lays them out
/// as one entry per day, oldest first, ending on `today`.
///
/// `fixes` must be ordered by timestamp. Fixes outside the window are ignored.
pub fn daily_distances(fixes: &[GpsFix], today: NaiveDate) -> Vec<DailyDistance> {
    let mut totals: HashMap<NaiveDate, f64> = HashMap::new();

    for pair in fixes.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let day = cur.timestamp.date_naive();
        if prev.timestamp.date_naive() != day {
            continue;
        }
        *totals.entry(day).or_insert(0.0) +=
            haversine_km(prev.latitude, prev.longitude, cur.latitude, cur.longitude);
    }

    (0..WINDOW_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DailyDistance {
                date,
                distance_km: totals.get(&date).copied(),
            }
        })
        .collect()
}

/// Start of the oldest day in the window ending on `now`'s date.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first_day = now.date_naive() - Duration::days(WINDOW_DAYS - 1);
    first_day.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub async fn trailing_week(db: &DbPool, now: DateTime<Utc>) -> Result<Vec<DailyDistance>, AppError> {
    let end = (now.date_naive() + Duration::days(1))
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    let fixes = repo::forms::gps_fixes_in_window(db, window_start(now), end).await?;
    Ok(daily_distances(&fixes, now.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fix(id: i64, lat: f64, lon: f64, at: DateTime<Utc>) -> GpsFix {
        GpsFix {
            id,
            latitude: lat,
            longitude: lon,
            timestamp: at,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_km(27.7, 85.3, 27.7, 85.3), 0.0);
    }

    #[test]
    fn haversine_is_symmetric() {
        let ab = haversine_km(27.7172, 85.3240, 28.2096, 83.9856);
        let ba = haversine_km(28.2096, 83.9856, 27.7172, 85.3240);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() / 111.19 < 0.005, "got {d}");
    }

    #[test]
    fn always_seven_days_oldest_first() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let days = daily_distances(&[], today);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
        assert_eq!(days[6].date, today);
        assert!(days.iter().all(|d| d.distance_km.is_none()));
    }

    #[test]
    fn single_fix_day_is_absent_not_zero() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let days = daily_distances(&[fix(1, 0.0, 0.0, at(9, 8))], today);
        assert_eq!(days[5].distance_km, None);
    }

    #[test]
    fn repeated_position_is_measured_zero() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let fixes = [fix(1, 1.0, 1.0, at(10, 8)), fix(2, 1.0, 1.0, at(10, 9))];
        assert_eq!(daily_distances(&fixes, today)[6].distance_km, Some(0.0));
    }

    #[test]
    fn sums_consecutive_pairs_only() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let fixes = [
            fix(1, 0.0, 0.0, at(10, 8)),
            fix(2, 0.0, 1.0, at(10, 9)),
            fix(3, 0.0, 2.0, at(10, 10)),
        ];
        let consecutive = haversine_km(0.0, 0.0, 0.0, 1.0) + haversine_km(0.0, 1.0, 0.0, 2.0);
        let all_pairs = consecutive + haversine_km(0.0, 0.0, 0.0, 2.0);
        let total = daily_distances(&fixes, today)[6].distance_km.unwrap();
        assert!((total - consecutive).abs() < 1e-9);
        assert!((total - all_pairs).abs() > 100.0);
    }

    #[test]
    fn no_segment_across_midnight() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let fixes = [
            fix(1, 0.0, 0.0, at(9, 23)),
            fix(2, 0.0, 1.0, at(10, 1)),
            fix(3, 0.0, 2.0, at(10, 2)),
        ];
        let days = daily_distances(&fixes, today);
        assert_eq!(days[5].distance_km, None);
        let total = days[6].distance_km.unwrap();
        assert!((total - haversine_km(0.0, 1.0, 0.0, 2.0)).abs() < 1e-9);
    }

    #[test]
    fn window_starts_at_midnight_six_days_back() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        assert_eq!(window_start(now), Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn serializes_null_for_missing_days() {
        let entry = DailyDistance {
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            distance_km: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"date": "2024-05-10", "distance": null}));
    }
}
