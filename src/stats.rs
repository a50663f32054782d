//! Dashboard aggregation over the projected record sets.

use crate::countries::activity_countries;
use crate::geocode::GeocodeCache;
use crate::records::{ActivityRecord, VisitRecord};
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Origin instant for the elapsed-days counter.
pub static JOURNEY_START: Lazy<DateTime<Utc>> = Lazy::new(|| {
    Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0)
        .single()
        .expect("journey start is a valid instant")
});

/// Transport-mode label counted as vehicle distance.
pub const MODE_VEHICLE: &str = "IN_PASSENGER_VEHICLE";
/// Transport-mode labels counted as walking distance.
pub const MODES_WALKING: [&str; 2] = ["WALKING", "ON_FOOT"];
/// Transport-mode label counted as cycling distance.
pub const MODE_CYCLING: &str = "CYCLING";

/// Aggregate dashboard statistics, recomputed from the full record sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub vehicle_distance_km: f64,
    pub walking_distance_km: f64,
    pub cycling_distance_km: f64,
    pub countries_visited: usize,
    pub days_on_road: i64,
    pub current_location: String,
    pub total_activities: usize,
    pub avg_distance_per_day_km: f64,
    pub most_common_activity: String,
}

impl DashboardStats {
    /// The all-zero payload served for an empty model.
    pub fn empty() -> Self {
        Self {
            vehicle_distance_km: 0.0,
            walking_distance_km: 0.0,
            cycling_distance_km: 0.0,
            countries_visited: 0,
            days_on_road: 0,
            current_location: "Unknown".to_string(),
            total_activities: 0,
            avg_distance_per_day_km: 0.0,
            most_common_activity: "Unknown".to_string(),
        }
    }
}

/// Compute dashboard statistics as of `now`.
///
/// The distinct-country subroutine classifies every start/end coordinate of
/// every activity record, which makes the whole computation expensive;
/// callers memoize the result for the lifetime of the (immutable) model.
pub fn compute_stats(
    activities: &[ActivityRecord],
    visits: &[VisitRecord],
    geocode: &GeocodeCache,
    now: DateTime<Utc>,
) -> DashboardStats {
    if activities.is_empty() && visits.is_empty() {
        return DashboardStats::empty();
    }

    let mode_meters = |matches: &dyn Fn(&str) -> bool| -> f64 {
        activities
            .iter()
            .filter(|a| a.mode.as_deref().is_some_and(matches))
            .map(|a| a.distance_meters)
            .sum()
    };

    let vehicle_km = mode_meters(&|m| m == MODE_VEHICLE) / 1000.0;
    let walking_km = mode_meters(&|m| MODES_WALKING.contains(&m)) / 1000.0;
    let cycling_km = mode_meters(&|m| m == MODE_CYCLING) / 1000.0;

    let days_on_road = (now - *JOURNEY_START).num_days().max(0);
    let avg_km = if days_on_road > 0 {
        vehicle_km / days_on_road as f64
    } else {
        0.0
    };

    DashboardStats {
        vehicle_distance_km: round1(vehicle_km),
        walking_distance_km: round1(walking_km),
        cycling_distance_km: round1(cycling_km),
        countries_visited: activity_countries(activities).len(),
        days_on_road,
        current_location: current_location(activities, visits, geocode),
        total_activities: activities.len(),
        avg_distance_per_day_km: round1(avg_km),
        most_common_activity: most_common_mode(activities),
    }
}

/// Most frequent transport-mode label, ties broken by first encounter.
fn most_common_mode(activities: &[ActivityRecord]) -> String {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new(); // mode -> (count, first index)

    for (index, activity) in activities.iter().enumerate() {
        if let Some(mode) = activity.mode.as_deref() {
            let slot = counts.entry(mode).or_insert((0, index));
            slot.0 += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(mode, _)| mode.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Resolve the current location from the chronologically last coordinate.
///
/// Prefers the last activity end coordinate, falls back to the last visit
/// place coordinate, then geocodes: city over country over `"Unknown"`.
fn current_location(
    activities: &[ActivityRecord],
    visits: &[VisitRecord],
    geocode: &GeocodeCache,
) -> String {
    let last_activity_end = activities
        .iter()
        .filter(|a| a.end.is_some())
        .max_by_key(|a| a.start_time)
        .and_then(|a| a.end);

    let point = last_activity_end.or_else(|| {
        visits
            .iter()
            .filter(|v| v.place.is_some())
            .max_by_key(|v| v.start_time)
            .and_then(|v| v.place)
    });

    match point {
        Some(point) => {
            let resolved = geocode.resolve(point);
            if !resolved.city.is_empty() {
                resolved.city
            } else if !resolved.country.is_empty() {
                resolved.country
            } else {
                "Unknown".to_string()
            }
        }
        None => "Unknown".to_string(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
