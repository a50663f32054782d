//! Coarse country classification from a static bounding-box table.
//!
//! Each entry pairs a country name with a closed latitude interval and a
//! closed longitude interval. The table is *ordered*: lookup returns the
//! first containing box in declaration order, so overlapping boxes are
//! resolved by position, not by best fit or area. This is a deliberate
//! simplification, not a geodesically accurate country lookup.

use crate::records::ActivityRecord;
use std::collections::BTreeSet;

/// A rectangular latitude/longitude region standing in for a country.
#[derive(Debug, Clone, Copy)]
pub struct CountryBoundingBox {
    pub country: &'static str,
    /// Closed interval `[min, max]` in degrees latitude.
    pub lat: (f64, f64),
    /// Closed interval `[min, max]` in degrees longitude.
    pub lng: (f64, f64),
}

const fn entry(country: &'static str, lat: (f64, f64), lng: (f64, f64)) -> CountryBoundingBox {
    CountryBoundingBox { country, lat, lng }
}

/// Ordered European bounding-box table. First match wins.
pub static COUNTRY_BOUNDS: &[CountryBoundingBox] = &[
    // Western Europe
    entry("Portugal", (36.8, 42.2), (-9.5, -6.2)),
    entry("Spain", (35.2, 43.8), (-9.3, 4.3)),
    entry("Liechtenstein", (47.0, 47.3), (9.4, 9.6)),
    entry("France", (41.3, 51.1), (-5.1, 9.6)),
    entry("Ireland", (51.4, 55.4), (-10.5, -5.9)),
    entry("United Kingdom", (49.9, 60.8), (-8.2, 1.8)),
    // Central Europe
    entry("Germany", (47.3, 55.1), (5.9, 15.0)),
    entry("Austria", (46.4, 49.0), (9.5, 17.2)),
    entry("Switzerland", (45.8, 47.8), (5.9, 10.5)),
    // Benelux
    entry("Netherlands", (50.8, 53.6), (3.4, 7.2)),
    entry("Belgium", (49.5, 51.5), (2.5, 6.4)),
    entry("Luxembourg", (49.4, 50.2), (5.7, 6.5)),
    // Nordic countries
    entry("Norway", (57.9, 71.2), (4.6, 31.3)),
    entry("Sweden", (55.3, 69.1), (11.0, 24.2)),
    entry("Finland", (59.8, 70.1), (20.6, 31.6)),
    entry("Denmark", (54.6, 57.8), (8.1, 15.2)),
    entry("Iceland", (63.4, 66.6), (-24.5, -13.5)),
    // Eastern Europe
    entry("Poland", (49.0, 54.8), (14.1, 24.1)),
    entry("Czech Republic", (48.6, 51.1), (12.1, 18.9)),
    entry("Slovakia", (47.7, 49.6), (16.8, 22.6)),
    entry("Hungary", (45.7, 48.6), (16.1, 22.9)),
    entry("Slovenia", (45.4, 46.9), (13.4, 16.6)),
    entry("Croatia", (42.4, 46.5), (13.5, 19.4)),
    entry("Bosnia and Herzegovina", (42.6, 45.3), (15.7, 19.6)),
    entry("Serbia", (42.2, 46.2), (18.8, 23.0)),
    entry("Montenegro", (41.9, 43.6), (18.4, 20.4)),
    entry("North Macedonia", (40.8, 42.4), (20.4, 23.0)),
    entry("Albania", (39.6, 42.7), (19.1, 21.1)),
    entry("Kosovo", (41.8, 43.3), (20.0, 21.8)),
    // Southern Europe
    entry("Italy", (35.5, 47.1), (6.6, 18.5)),
    entry("San Marino", (43.9, 43.9), (12.4, 12.5)),
    entry("Vatican City", (41.9, 41.9), (12.4, 12.5)),
    entry("Malta", (35.8, 36.1), (14.2, 14.6)),
    entry("Greece", (34.8, 41.7), (19.4, 29.7)),
    entry("Cyprus", (34.6, 35.7), (32.3, 34.6)),
    // Baltic states
    entry("Estonia", (57.5, 59.7), (21.8, 28.2)),
    entry("Latvia", (55.7, 58.1), (20.7, 28.2)),
    entry("Lithuania", (53.9, 56.4), (20.9, 26.8)),
    // Eastern Europe (continued)
    entry("Belarus", (51.3, 56.2), (23.2, 32.8)),
    entry("Moldova", (45.5, 48.5), (26.6, 30.2)),
    entry("Ukraine", (45.0, 52.4), (22.1, 40.2)),
    entry("Romania", (43.7, 48.3), (20.2, 29.7)),
    entry("Bulgaria", (41.2, 44.2), (22.4, 28.6)),
    // Known defect carried from the source table: the longitude interval
    // wraps the antimeridian (min > max), so the naive closed-interval test
    // below can never contain a point in it. Kept as-is; see DESIGN.md.
    entry("Russia", (41.2, 81.9), (19.6, -169.0)),
    // Caucasus
    entry("Georgia", (41.1, 43.6), (39.9, 46.7)),
    entry("Armenia", (38.8, 41.3), (43.4, 46.8)),
    entry("Azerbaijan", (38.4, 42.0), (44.8, 50.4)),
    // Turkey (European part)
    entry("Turkey", (35.8, 42.1), (25.7, 44.8)),
];

/// Classify a coordinate pair against the ordered table.
///
/// Returns the first box whose closed intervals both contain the point, or
/// `None` when the point lies outside every box. O(table length) per call.
///
/// # Example
/// ```
/// use journey_engine::classify;
/// assert_eq!(classify(48.8566, 2.3522), Some("France"));
/// assert_eq!(classify(0.0, 0.0), None); // Gulf of Guinea
/// ```
pub fn classify(lat: f64, lng: f64) -> Option<&'static str> {
    COUNTRY_BOUNDS
        .iter()
        .find(|b| lat >= b.lat.0 && lat <= b.lat.1 && lng >= b.lng.0 && lng <= b.lng.1)
        .map(|b| b.country)
}

/// Classify every start and end coordinate of the given activity records and
/// collect the distinct country names, sorted.
///
/// This is the expensive sweep shared by the dashboard country count and the
/// filter metadata; callers memoize the surrounding result.
#[cfg(not(feature = "parallel"))]
pub fn activity_countries(records: &[ActivityRecord]) -> BTreeSet<&'static str> {
    records
        .iter()
        .flat_map(|r| [r.start, r.end])
        .flatten()
        .filter_map(|p| classify(p.latitude, p.longitude))
        .collect()
}

/// Classify every start and end coordinate of the given activity records and
/// collect the distinct country names, sorted.
///
/// Parallel variant of the sweep, enabled by the `parallel` feature.
#[cfg(feature = "parallel")]
pub fn activity_countries(records: &[ActivityRecord]) -> BTreeSet<&'static str> {
    use rayon::prelude::*;

    records
        .par_iter()
        .flat_map_iter(|r| [r.start, r.end])
        .flatten_iter()
        .filter_map(|p| classify(p.latitude, p.longitude))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LatLng;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_classify_paris() {
        assert_eq!(classify(48.8566, 2.3522), Some("France"));
    }

    #[test]
    fn test_classify_open_ocean() {
        assert_eq!(classify(0.0, 0.0), None);
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        // Vaduz lies inside the Liechtenstein, Switzerland and Austria boxes;
        // Liechtenstein is declared first.
        assert_eq!(classify(47.14, 9.52), Some("Liechtenstein"));
    }

    #[test]
    fn test_russia_entry_never_matches() {
        // Moscow: inside the latitude interval, but the wrapped longitude
        // interval fails the naive containment test.
        assert_eq!(classify(55.7558, 37.6173), None);
    }

    #[test]
    fn test_activity_countries_sweep() {
        let base = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        let record = |start: Option<LatLng>, end: Option<LatLng>| ActivityRecord {
            start,
            end,
            parking: None,
            parking_start_time: None,
            distance_meters: 0.0,
            probability: None,
            mode: None,
            start_time: base,
            end_time: base,
        };

        let records = vec![
            // Paris -> Berlin
            record(
                Some(LatLng::new(48.8566, 2.3522)),
                Some(LatLng::new(52.52, 13.405)),
            ),
            // Berlin -> open ocean
            record(Some(LatLng::new(52.52, 13.405)), Some(LatLng::new(0.0, 0.0))),
            // Missing coordinates contribute nothing
            record(None, None),
        ];

        let countries = activity_countries(&records);
        assert_eq!(
            countries.into_iter().collect::<Vec<_>>(),
            vec!["France", "Germany"]
        );
    }
}
