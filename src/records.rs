//! Projection of normalized segments into typed activity and visit records.
//!
//! Both projectors preserve input order and keep a one-to-one correspondence
//! with their flagged segments: a record is never dropped for a missing or
//! unparseable coordinate, the absence is encoded at the field level instead.

use crate::export::RawSegment;
use crate::{parse_lat_lng, LatLng};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A flat record derived from an activity-flagged segment.
///
/// Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub start: Option<LatLng>,
    pub end: Option<LatLng>,
    pub parking: Option<LatLng>,
    pub parking_start_time: Option<DateTime<Utc>>,
    pub distance_meters: f64,
    pub probability: Option<f64>,
    /// Top-candidate transport-mode label, e.g. `"IN_PASSENGER_VEHICLE"`.
    pub mode: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A place record derived from a visit-flagged segment.
///
/// Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct VisitRecord {
    /// Extraction may fail and yield none.
    pub place: Option<LatLng>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Expand activity-flagged segments into [`ActivityRecord`]s.
pub fn project_activities(segments: &[RawSegment]) -> Vec<ActivityRecord> {
    segments
        .iter()
        .filter(|segment| segment.is_activity)
        .map(activity_record)
        .collect()
}

fn activity_record(segment: &RawSegment) -> ActivityRecord {
    let activity = segment.activity.as_ref();
    let parking = activity.and_then(|a| a.parking.as_ref());

    ActivityRecord {
        start: activity
            .and_then(|a| a.start.as_ref())
            .and_then(|l| l.lat_lng.as_deref())
            .and_then(parse_lat_lng),
        end: activity
            .and_then(|a| a.end.as_ref())
            .and_then(|l| l.lat_lng.as_deref())
            .and_then(parse_lat_lng),
        parking: parking
            .and_then(|p| p.location.as_ref())
            .and_then(|l| l.lat_lng.as_deref())
            .and_then(parse_lat_lng),
        parking_start_time: parking
            .and_then(|p| p.start_time.as_deref())
            .and_then(|t| t.parse().ok()),
        distance_meters: activity.and_then(|a| a.distance_meters).unwrap_or(0.0),
        probability: activity.and_then(|a| a.probability),
        mode: activity
            .and_then(|a| a.top_candidate.as_ref())
            .and_then(|c| c.kind.clone()),
        start_time: segment.start_time,
        end_time: segment.end_time,
    }
}

/// Expand visit-flagged segments into [`VisitRecord`]s.
pub fn project_visits(segments: &[RawSegment]) -> Vec<VisitRecord> {
    segments
        .iter()
        .filter(|segment| segment.is_visit)
        .map(|segment| VisitRecord {
            place: segment
                .visit
                .as_ref()
                .and_then(|v| v.top_candidate.as_ref())
                .and_then(|c| c.place_location.as_ref())
                .and_then(|l| l.lat_lng.as_deref())
                .and_then(parse_lat_lng),
            start_time: segment.start_time,
            end_time: segment.end_time,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{normalize_segments, parse_export};

    fn segments_from(doc: &str) -> Vec<RawSegment> {
        normalize_segments(parse_export(doc).unwrap())
    }

    #[test]
    fn test_activity_projection_extracts_all_fields() {
        let segments = segments_from(
            r#"{"semanticSegments": [{
                "startTime": "2025-07-01T08:00:00Z",
                "endTime": "2025-07-01T09:00:00Z",
                "activity": {
                    "start": {"latLng": "47.1°, 8.5°"},
                    "end": {"latLng": "47.2°, 8.6°"},
                    "distanceMeters": 12000.0,
                    "probability": 0.93,
                    "topCandidate": {"type": "IN_PASSENGER_VEHICLE"},
                    "parking": {
                        "location": {"latLng": "47.21°, 8.61°"},
                        "startTime": "2025-07-01T09:05:00Z"
                    }
                }
            }]}"#,
        );
        let records = project_activities(&segments);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.start, Some(LatLng::new(47.1, 8.5)));
        assert_eq!(record.end, Some(LatLng::new(47.2, 8.6)));
        assert_eq!(record.parking, Some(LatLng::new(47.21, 8.61)));
        assert!(record.parking_start_time.is_some());
        assert_eq!(record.distance_meters, 12000.0);
        assert_eq!(record.probability, Some(0.93));
        assert_eq!(record.mode.as_deref(), Some("IN_PASSENGER_VEHICLE"));
    }

    #[test]
    fn test_unparseable_coordinate_yields_absent_field_not_dropped_record() {
        let segments = segments_from(
            r#"{"semanticSegments": [{
                "startTime": "2025-07-01T08:00:00Z",
                "endTime": "2025-07-01T09:00:00Z",
                "activity": {
                    "start": {"latLng": "garbage"},
                    "distanceMeters": 500.0
                }
            }]}"#,
        );
        let records = project_activities(&segments);

        assert_eq!(records.len(), 1);
        assert!(records[0].start.is_none());
        assert!(records[0].end.is_none());
        assert_eq!(records[0].distance_meters, 500.0);
        assert!(records[0].mode.is_none());
    }

    #[test]
    fn test_one_to_one_with_activity_segments() {
        let segments = segments_from(
            r#"{"semanticSegments": [
                {"startTime": "2025-07-01T08:00:00Z", "endTime": "2025-07-01T09:00:00Z",
                 "activity": {}},
                {"startTime": "2025-07-01T09:00:00Z", "endTime": "2025-07-01T10:00:00Z",
                 "visit": {}},
                {"startTime": "2025-07-01T10:00:00Z", "endTime": "2025-07-01T11:00:00Z",
                 "activity": {}}
            ]}"#,
        );

        assert_eq!(project_activities(&segments).len(), 2);
        assert_eq!(project_visits(&segments).len(), 1);
    }

    #[test]
    fn test_visit_projection() {
        let segments = segments_from(
            r#"{"semanticSegments": [
                {"startTime": "2025-07-01T08:00:00Z", "endTime": "2025-07-01T09:00:00Z",
                 "visit": {"topCandidate": {"placeLocation": {"latLng": "-33.86°, 151.20°"}}}},
                {"startTime": "2025-07-01T09:00:00Z", "endTime": "2025-07-01T10:00:00Z",
                 "visit": {"topCandidate": {}}}
            ]}"#,
        );
        let records = project_visits(&segments);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].place, Some(LatLng::new(-33.86, 151.20)));
        assert!(records[1].place.is_none());
    }
}
