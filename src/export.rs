//! Raw export document model and segment normalization.
//!
//! The source export is a single JSON document with a `semanticSegments`
//! array. Each entry is a time interval carrying at most one of three
//! optional sub-objects (`visit`, `activity`, `timelinePath`). Normalization
//! tags each entry with role flags derived from sub-object presence, converts
//! the interval timestamps, and drops entries that start before the fixed
//! cutoff instant.
//!
//! Failure policy: a document that cannot be read or parsed as a whole is a
//! [`LoadError`]; callers degrade to an empty model rather than accepting a
//! partial one. Malformed *nested* fields (coordinate strings, parking
//! timestamps) are tolerated and surface as absent values downstream.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Segments whose start instant precedes this cutoff are dropped at load
/// time. The filter is applied once, immutably, during normalization.
pub static CUTOFF_DATE: Lazy<DateTime<Utc>> = Lazy::new(|| {
    Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0)
        .single()
        .expect("cutoff date is a valid instant")
});

/// Failure to load or parse the export document as a whole.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read export: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed export document: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Wire Model
// ============================================================================

/// The parsed export document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineExport {
    pub semantic_segments: Vec<RawSegmentEntry>,
}

/// One entry of the `semanticSegments` array, as serialized in the export.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegmentEntry {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub visit: Option<RawVisit>,
    #[serde(default)]
    pub activity: Option<RawActivity>,
    #[serde(default)]
    pub timeline_path: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVisit {
    #[serde(default)]
    pub top_candidate: Option<RawVisitCandidate>,
    #[serde(default)]
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVisitCandidate {
    #[serde(default)]
    pub place_location: Option<RawLocation>,
}

/// A formatted `"<lat>°, <lng>°"` coordinate carrier.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    #[serde(default)]
    pub lat_lng: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivity {
    #[serde(default)]
    pub start: Option<RawLocation>,
    #[serde(default)]
    pub end: Option<RawLocation>,
    #[serde(default, deserialize_with = "de_opt_meters")]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub top_candidate: Option<RawActivityCandidate>,
    #[serde(default)]
    pub parking: Option<RawParking>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivityCandidate {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParking {
    #[serde(default)]
    pub location: Option<RawLocation>,
    /// Parsed leniently downstream; a bad value is an absent one.
    #[serde(default)]
    pub start_time: Option<String>,
}

/// Exports have shipped `distanceMeters` as both a JSON number and a string.
fn de_opt_meters<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<NumOrStr>::deserialize(deserializer)? {
        Some(NumOrStr::Num(value)) => Some(value),
        Some(NumOrStr::Str(text)) => text.trim().parse().ok(),
        None => None,
    })
}

// ============================================================================
// Normalized Segments
// ============================================================================

/// A normalized segment: the original interval plus role flags.
///
/// The three flags are derived independently from sub-object presence and are
/// not mutually exclusive, although in practice at most one is set.
#[derive(Debug, Clone)]
pub struct RawSegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_visit: bool,
    pub is_activity: bool,
    pub is_path: bool,
    pub visit: Option<RawVisit>,
    pub activity: Option<RawActivity>,
}

/// Normalize an export into an ordered segment sequence.
///
/// Order follows the original array order; no re-sorting by time. Segments
/// starting before [`CUTOFF_DATE`] are discarded.
pub fn normalize_segments(export: TimelineExport) -> Vec<RawSegment> {
    export
        .semantic_segments
        .into_iter()
        .filter(|entry| entry.start_time >= *CUTOFF_DATE)
        .map(|entry| RawSegment {
            start_time: entry.start_time,
            end_time: entry.end_time,
            is_visit: entry.visit.is_some(),
            is_activity: entry.activity.is_some(),
            is_path: entry.timeline_path.is_some(),
            visit: entry.visit,
            activity: entry.activity,
        })
        .collect()
}

/// Parse an export document from a JSON string.
pub fn parse_export(json: &str) -> Result<TimelineExport, LoadError> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse an export document from disk.
pub fn load_export(path: &Path) -> Result<TimelineExport, LoadError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

// ============================================================================
// Tests
// ============================================================================
