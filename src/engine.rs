//! The timeline engine: load once, query many times.
//!
//! [`TimelineEngine`] owns the projected record sets, the geocode cache, and
//! memoized derived views. The model is immutable after construction, so the
//! dashboard statistics and filter metadata are computed at most once and the
//! memoized values can never go stale.
//!
//! Load failures are absorbed: an unreadable or malformed export yields an
//! engine over an empty model, with the failure logged. Every query remains
//! answerable.

use crate::export::{load_export, parse_export, TimelineExport};
use crate::geocode::{GeocodeCache, NominatimGeocoder, ReverseGeocoder};
use crate::map::{build_filters, build_map_data, build_map_view, DateRange, FilterSet, MapPoint, MapQuery, MapView};
use crate::records::{project_activities, project_visits, ActivityRecord, VisitRecord};
use crate::stats::{compute_stats, DashboardStats};
use crate::LatLng;
use chrono::{DateTime, Utc};
use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::path::Path;

/// A named stop for the recent-stops listing.
#[derive(Debug, Clone, Serialize)]
pub struct RecentStop {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_hours: f64,
    pub coordinates: Option<LatLng>,
}

/// Query facade over one loaded timeline export.
pub struct TimelineEngine {
    activities: Vec<ActivityRecord>,
    visits: Vec<VisitRecord>,
    geocode: GeocodeCache,
    stats: OnceCell<DashboardStats>,
    filters: OnceCell<FilterSet>,
    loaded: bool,
}

impl TimelineEngine {
    /// Build an engine from an export file on disk.
    ///
    /// A file that cannot be read or parsed yields an empty engine, never an
    /// error.
    pub fn from_path(path: &Path) -> Self {
        match load_export(path) {
            Ok(export) => Self::from_export(export),
            Err(err) => {
                warn!("failed to load export from {}: {err}", path.display());
                Self::empty()
            }
        }
    }

    /// Build an engine from an export document held in memory.
    ///
    /// A malformed document yields an empty engine, never an error.
    pub fn from_json(json: &str) -> Self {
        match parse_export(json) {
            Ok(export) => Self::from_export(export),
            Err(err) => {
                warn!("failed to parse export: {err}");
                Self::empty()
            }
        }
    }

    /// Build an engine from a parsed export, geocoding against the public
    /// Nominatim service.
    pub fn from_export(export: TimelineExport) -> Self {
        Self::with_geocoder(export, Box::new(NominatimGeocoder::new()))
    }

    /// Build an engine from a parsed export with a caller-supplied geocoder.
    pub fn with_geocoder(export: TimelineExport, geocoder: Box<dyn ReverseGeocoder>) -> Self {
        let segments = crate::export::normalize_segments(export);
        let activities = project_activities(&segments);
        let visits = project_visits(&segments);
        info!(
            "timeline model built: {} activities, {} visits",
            activities.len(),
            visits.len()
        );

        Self {
            activities,
            visits,
            geocode: GeocodeCache::new(geocoder),
            stats: OnceCell::new(),
            filters: OnceCell::new(),
            loaded: true,
        }
    }

    /// An engine over no data. All queries return their empty shapes.
    pub fn empty() -> Self {
        Self {
            activities: Vec::new(),
            visits: Vec::new(),
            geocode: GeocodeCache::new(Box::new(NominatimGeocoder::new())),
            stats: OnceCell::new(),
            filters: OnceCell::new(),
            loaded: false,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Dashboard statistics, computed on first call and memoized.
    pub fn dashboard_stats(&self) -> &DashboardStats {
        self.stats.get_or_init(|| {
            compute_stats(&self.activities, &self.visits, &self.geocode, Utc::now())
        })
    }

    /// Renderable activity rows, optionally restricted to a date range.
    pub fn map_data(&self, range: Option<DateRange>) -> Vec<MapPoint> {
        build_map_data(&self.activities, range)
    }

    /// The most recent visits, newest first, with geocoded display names.
    pub fn recent_stops(&self, limit: usize) -> Vec<RecentStop> {
        let mut visits: Vec<&VisitRecord> = self.visits.iter().collect();
        visits.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        visits
            .into_iter()
            .take(limit)
            .map(|visit| {
                let name = match visit.place {
                    Some(place) => {
                        let resolved = self.geocode.resolve(place);
                        if !resolved.city.is_empty() {
                            resolved.city
                        } else {
                            resolved.name
                        }
                    }
                    None => "Unknown Location".to_string(),
                };

                RecentStop {
                    name,
                    start_time: visit.start_time,
                    end_time: visit.end_time,
                    duration_hours: (visit.end_time - visit.start_time).num_seconds() as f64
                        / 3600.0,
                    coordinates: visit.place,
                }
            })
            .collect()
    }

    /// The per-mode polyline view for a query.
    pub fn renderable_map(&self, query: &MapQuery) -> MapView {
        build_map_view(&self.activities, query)
    }

    /// Filter metadata for the model, computed on first call and memoized.
    pub fn available_filters(&self) -> &FilterSet {
        self.filters.get_or_init(|| build_filters(&self.activities))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn activities(&self) -> &[ActivityRecord] {
        &self.activities
    }

    pub fn visits(&self) -> &[VisitRecord] {
        &self.visits
    }

    /// False when the engine was built from an unreadable export.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{AddressFields, GeocodeError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingGeocoder {
        calls: AtomicU32,
    }

    impl ReverseGeocoder for Arc<CountingGeocoder> {
        fn reverse(
            &self,
            _lat: f64,
            _lng: f64,
            _timeout: Duration,
        ) -> Result<AddressFields, GeocodeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(AddressFields {
                display_name: "Porto, Portugal".into(),
                city: Some("Porto".into()),
                state: None,
                country: Some("Portugal".into()),
                country_code: Some("PT".into()),
            })
        }
    }

    fn sample_export() -> TimelineExport {
        parse_export(
            r#"{"semanticSegments": [
                {"startTime": "2025-07-01T08:00:00Z", "endTime": "2025-07-01T09:00:00Z",
                 "activity": {
                    "start": {"latLng": "41.15°, -8.61°"},
                    "end": {"latLng": "41.16°, -8.62°"},
                    "distanceMeters": 4000.0,
                    "topCandidate": {"type": "WALKING"}
                 }},
                {"startTime": "2025-07-01T09:00:00Z", "endTime": "2025-07-01T12:00:00Z",
                 "visit": {"topCandidate": {"placeLocation": {"latLng": "41.15°, -8.61°"}}}},
                {"startTime": "2025-07-02T09:00:00Z", "endTime": "2025-07-02T10:00:00Z",
                 "visit": {"topCandidate": {"placeLocation": {"latLng": "41.20°, -8.60°"}}}},
                {"startTime": "2025-07-03T09:00:00Z", "endTime": "2025-07-03T10:00:00Z",
                 "visit": {}}
            ]}"#,
        )
        .unwrap()
    }

    fn engine_with_counter() -> (TimelineEngine, Arc<CountingGeocoder>) {
        let geocoder = Arc::new(CountingGeocoder {
            calls: AtomicU32::new(0),
        });
        let engine =
            TimelineEngine::with_geocoder(sample_export(), Box::new(Arc::clone(&geocoder)));
        (engine, geocoder)
    }

    #[test]
    fn test_recent_stops_newest_first_with_names() {
        let (engine, _) = engine_with_counter();
        let stops = engine.recent_stops(3);

        assert_eq!(stops.len(), 3);
        assert!(stops[0].start_time > stops[1].start_time);
        assert!(stops[1].start_time > stops[2].start_time);
        assert_eq!(stops[0].name, "Unknown Location"); // visit without a place
        assert_eq!(stops[1].name, "Porto");
        assert_eq!(stops[2].duration_hours, 3.0);
        assert!(stops[2].coordinates.is_some());
    }

    #[test]
    fn test_recent_stops_limit() {
        let (engine, _) = engine_with_counter();
        assert_eq!(engine.recent_stops(1).len(), 1);
    }

    #[test]
    fn test_dashboard_stats_memoized() {
        let (engine, geocoder) = engine_with_counter();

        let first = engine.dashboard_stats().clone();
        let calls_after_first = geocoder.calls.load(Ordering::Relaxed);
        let second = engine.dashboard_stats().clone();

        assert_eq!(first, second);
        assert_eq!(geocoder.calls.load(Ordering::Relaxed), calls_after_first);
        assert_eq!(first.walking_distance_km, 4.0);
        assert_eq!(first.total_activities, 1);
        assert_eq!(first.current_location, "Porto");
    }

    #[test]
    fn test_available_filters_memoized_and_correct() {
        let (engine, _) = engine_with_counter();
        let filters = engine.available_filters();

        assert_eq!(filters.transport_modes, vec!["WALKING"]);
        assert_eq!(filters.countries, vec!["Portugal"]);
        assert_eq!(filters.min_date.as_deref(), Some("2025-07-01"));
        assert!(std::ptr::eq(filters, engine.available_filters()));
    }

    #[test]
    fn test_malformed_json_degrades_to_empty_engine() {
        let engine = TimelineEngine::from_json("not an export");

        assert!(!engine.is_loaded());
        assert!(engine.activities().is_empty());
        assert_eq!(*engine.dashboard_stats(), DashboardStats::empty());
        assert!(engine.recent_stops(5).is_empty());
        assert_eq!(engine.renderable_map(&MapQuery::default()).record_count, 0);
    }

    #[test]
    fn test_missing_file_degrades_to_empty_engine() {
        let engine = TimelineEngine::from_path(Path::new("/nonexistent/export.json"));
        assert!(!engine.is_loaded());
        assert!(engine.map_data(None).is_empty());
    }
}
