//! # Journey Engine
//!
//! Ingestion, normalization, classification and aggregation for
//! location-history exports.
//!
//! The engine consumes a semantic-segment export (time-ordered visits,
//! activities and paths), projects it into typed records, classifies
//! coordinates against a coarse country table, memoizes reverse-geocoding
//! lookups, and answers dashboard and map-rendering queries.
//!
//! ## Features
//!
//! - **`parallel`** - Parallel country-classification sweeps with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use journey_engine::TimelineEngine;
//!
//! let export = r#"{
//!     "semanticSegments": [{
//!         "startTime": "2025-06-12T08:00:00Z",
//!         "endTime": "2025-06-12T09:30:00Z",
//!         "activity": {
//!             "start": {"latLng": "48.8566°, 2.3522°"},
//!             "end": {"latLng": "48.8738°, 2.2950°"},
//!             "distanceMeters": 5200.0,
//!             "topCandidate": {"type": "IN_PASSENGER_VEHICLE"}
//!         }
//!     }]
//! }"#;
//!
//! let engine = TimelineEngine::from_json(export);
//! let points = engine.map_data(None);
//! assert_eq!(points.len(), 1);
//! assert_eq!(points[0].start_location, Some("France"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub mod countries;
pub mod engine;
pub mod export;
pub mod geocode;
pub mod map;
pub mod records;
pub mod stats;

pub use countries::{activity_countries, classify, CountryBoundingBox, COUNTRY_BOUNDS};
pub use engine::{RecentStop, TimelineEngine};
pub use export::{
    load_export, normalize_segments, parse_export, LoadError, RawSegment, TimelineExport,
    CUTOFF_DATE,
};
pub use geocode::{
    AddressFields, GeocodeCache, GeocodeCacheConfig, GeocodeError, GeocodeResult,
    NominatimGeocoder, ReverseGeocoder,
};
pub use map::{
    build_filters, build_map_data, build_map_view, color_for_mode, DateRange, FilterSet,
    MapPoint, MapQuery, MapView, PolylineTrace,
};
pub use records::{project_activities, project_visits, ActivityRecord, VisitRecord};
pub use stats::{compute_stats, DashboardStats, JOURNEY_START};

// ============================================================================
// Core Types
// ============================================================================

/// A coordinate pair in signed decimal degrees.
///
/// # Example
/// ```
/// use journey_engine::LatLng;
/// let point = LatLng::new(48.8566, 2.3522); // Paris
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    /// Create a new coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the pair is a plausible geographic coordinate.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

// ============================================================================
// Coordinate Parser
// ============================================================================

static LAT_LNG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([-+]?\d+(?:\.\d+)?)\s*°\s*,\s*([-+]?\d+(?:\.\d+)?)\s*°")
        .expect("lat/lng pattern is valid")
});

/// Extract a coordinate pair from a formatted `"<lat>°, <lng>°"` string.
///
/// Tolerates surrounding whitespace and either sign. Returns `None` when the
/// pattern is absent or malformed.
///
/// # Example
/// ```
/// use journey_engine::parse_lat_lng;
///
/// let point = parse_lat_lng("47.1234°, 8.5678°").unwrap();
/// assert_eq!(point.latitude, 47.1234);
/// assert!(parse_lat_lng("not a coordinate").is_none());
/// ```
pub fn parse_lat_lng(text: &str) -> Option<LatLng> {
    let caps = LAT_LNG_PATTERN.captures(text)?;
    let latitude: f64 = caps[1].parse().ok()?;
    let longitude: f64 = caps[2].parse().ok()?;
    Some(LatLng::new(latitude, longitude))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_validation() {
        assert!(LatLng::new(48.8566, 2.3522).is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 181.0).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_parse_lat_lng() {
        let point = parse_lat_lng("47.1234°, 8.5678°").unwrap();
        assert_eq!(point, LatLng::new(47.1234, 8.5678));
    }

    #[test]
    fn test_parse_lat_lng_negative() {
        let point = parse_lat_lng("-33.86°, 151.20°").unwrap();
        assert_eq!(point, LatLng::new(-33.86, 151.20));
    }

    #[test]
    fn test_parse_lat_lng_whitespace() {
        let point = parse_lat_lng("  47.5° ,  -122.3°  ").unwrap();
        assert_eq!(point, LatLng::new(47.5, -122.3));
    }

    #[test]
    fn test_parse_lat_lng_no_match() {
        assert!(parse_lat_lng("not a coordinate").is_none());
        assert!(parse_lat_lng("").is_none());
        assert!(parse_lat_lng("47.5, -122.3").is_none()); // no degree markers
    }
}
