//! Map projection: filtered rows, downsampling, and per-mode polyline traces.
//!
//! The pipeline has two stages. [`build_map_data`] flattens activity records
//! into renderable rows with a stable color per transport mode, optionally
//! restricted to a date range. [`build_map_view`] applies query filters,
//! downsamples large result sets by stride, and groups the survivors into one
//! polyline trace per mode with `None` separators between segments.

use crate::countries::classify;
use crate::records::ActivityRecord;
use crate::LatLng;
use chrono::NaiveDate;
use log::debug;
use serde::Serialize;

/// Hard cap on rendered rows; larger sets are stride-downsampled.
pub const MAX_RENDER_RECORDS: usize = 200;

/// Map center used when no sampled row carries a coordinate.
pub const DEFAULT_CENTER: LatLng = LatLng {
    latitude: 40.0,
    longitude: 0.0,
};

const DEFAULT_ZOOM: u8 = 6;
const TRACE_WIDTH: u32 = 3;
const COLOR_FALLBACK: &str = "#636363";

/// Stable display color for a transport-mode label.
pub fn color_for_mode(mode: &str) -> &'static str {
    match mode {
        "IN_PASSENGER_VEHICLE" => "#1f77b4",
        "CYCLING" => "#2ca02c",
        "WALKING" => "#ff7f0e",
        "IN_VEHICLE" => "#d62728",
        "ON_FOOT" => "#9467bd",
        "RUNNING" => "#8c564b",
        "IN_ROAD_VEHICLE" => "#e377c2",
        "IN_RAIL_VEHICLE" => "#7f7f7f",
        "MOTORCYCLING" => "#bcbd22",
        "FLYING" => "#8b4513",
        "IN_BUS" => "#17becf",
        "IN_TRAIN" => "#bcbd22",
        "IN_TRAM" => "#e377c2",
        "IN_SUBWAY" => "#7f7f7f",
        "SAILING" => "#1f77b4",
        _ => COLOR_FALLBACK,
    }
}

/// An inclusive calendar-date window, open on either side.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Whether `t` falls inside the window. Both bounds compare against the
    /// midnight UTC instant of their date, so the end bound admits only the
    /// very first instant of its day.
    pub fn contains(&self, t: chrono::DateTime<chrono::Utc>) -> bool {
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc();

        if let Some(start) = self.start {
            if t < midnight(start) {
                return false;
            }
        }
        if let Some(end) = self.end {
            if t > midnight(end) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Map Rows
// ============================================================================

/// One renderable activity row. Only records with both endpoint coordinates
/// become rows.
#[derive(Debug, Clone, Serialize)]
pub struct MapPoint {
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: f64,
    pub end_lng: f64,
    /// `"UNKNOWN"` when the record has no mode label.
    pub activity_type: String,
    pub color: &'static str,
    pub distance_meters: f64,
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: f64,
    pub start_location: Option<&'static str>,
    pub end_location: Option<&'static str>,
}

/// Flatten activity records into renderable rows, keeping input order.
///
/// Records missing either endpoint coordinate are skipped. When `range` is
/// given, rows are kept only if their start instant falls inside it.
pub fn build_map_data(activities: &[ActivityRecord], range: Option<DateRange>) -> Vec<MapPoint> {
    activities
        .iter()
        .filter(|a| match range {
            Some(r) => r.contains(a.start_time),
            None => true,
        })
        .filter_map(|a| {
            let start = a.start?;
            let end = a.end?;
            let mode = a.mode.clone().unwrap_or_else(|| "UNKNOWN".to_string());
            let duration_hours =
                (a.end_time - a.start_time).num_seconds() as f64 / 3600.0;

            Some(MapPoint {
                start_lat: start.latitude,
                start_lng: start.longitude,
                end_lat: end.latitude,
                end_lng: end.longitude,
                color: color_for_mode(&mode),
                activity_type: mode,
                distance_meters: a.distance_meters,
                start_time: a.start_time.to_rfc3339(),
                end_time: a.end_time.to_rfc3339(),
                duration_hours,
                start_location: classify(start.latitude, start.longitude),
                end_location: classify(end.latitude, end.longitude),
            })
        })
        .collect()
}

// ============================================================================
// Map View
// ============================================================================

/// Filter parameters for a rendered map view.
#[derive(Debug, Clone, Default)]
pub struct MapQuery {
    /// Accepted for interface compatibility; country filtering happens
    /// upstream of rendering and this value is not applied.
    pub country: Option<String>,
    pub transport_mode: Option<String>,
    pub range: DateRange,
}

/// One per-mode polyline trace. Segment breaks are encoded as `None` entries
/// in the coordinate and hover arrays.
#[derive(Debug, Clone, Serialize)]
pub struct PolylineTrace {
    /// Mode label with underscores replaced by spaces.
    pub name: String,
    pub color: &'static str,
    pub width: u32,
    pub lats: Vec<Option<f64>>,
    pub lngs: Vec<Option<f64>>,
    pub hover: Vec<Option<String>>,
}

/// A fully assembled map view.
#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub traces: Vec<PolylineTrace>,
    pub center: LatLng,
    pub zoom: u8,
    pub title: String,
    /// Rows actually rendered, after filtering and downsampling.
    pub record_count: usize,
}

impl MapView {
    fn empty() -> Self {
        Self {
            traces: Vec::new(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            title: "Journey Map (0 activities)".to_string(),
            record_count: 0,
        }
    }
}

/// Assemble the per-mode polyline view for a query.
///
/// Records missing either endpoint coordinate are dropped, the rest are
/// filtered by mode and date range, then stride-downsampled to at most
/// [`MAX_RENDER_RECORDS`]. Rows without a mode label are excluded from
/// traces (there is no catch-all trace); trace order follows each mode's
/// first encounter in the sampled rows.
pub fn build_map_view(activities: &[ActivityRecord], query: &MapQuery) -> MapView {
    let filtered: Vec<&ActivityRecord> = activities
        .iter()
        .filter(|a| a.start.is_some() && a.end.is_some())
        .filter(|a| match query.transport_mode.as_deref() {
            Some(mode) => a.mode.as_deref() == Some(mode),
            None => true,
        })
        .filter(|a| query.range.contains(a.start_time))
        .collect();

    if filtered.is_empty() {
        return MapView::empty();
    }

    let sampled = downsample(filtered);

    let mut traces: Vec<(String, PolylineTrace)> = Vec::new();
    for record in &sampled {
        let Some(mode) = record.mode.as_deref() else {
            continue;
        };

        let index = match traces.iter().position(|(m, _)| m.as_str() == mode) {
            Some(index) => index,
            None => {
                traces.push((
                    mode.to_string(),
                    PolylineTrace {
                        name: mode.replace('_', " "),
                        color: color_for_mode(mode),
                        width: TRACE_WIDTH,
                        lats: Vec::new(),
                        lngs: Vec::new(),
                        hover: Vec::new(),
                    },
                ));
                traces.len() - 1
            }
        };
        let trace = &mut traces[index].1;

        let (Some(start), Some(end)) = (record.start, record.end) else {
            continue;
        };

        let hover = format!(
            "{}\nDistance: {:.0}m\nDate: {}",
            mode,
            record.distance_meters,
            record.start_time.format("%Y-%m-%d")
        );

        trace.lats.extend([
            Some(start.latitude),
            Some(end.latitude),
            None,
        ]);
        trace.lngs.extend([
            Some(start.longitude),
            Some(end.longitude),
            None,
        ]);
        trace.hover.extend([Some(hover.clone()), Some(hover), None]);
    }

    let record_count = sampled.len();
    MapView {
        traces: traces.into_iter().map(|(_, t)| t).collect(),
        center: center_of(&sampled),
        zoom: DEFAULT_ZOOM,
        title: format!("Journey Map ({record_count} activities)"),
        record_count,
    }
}

/// Keep every `len / MAX_RENDER_RECORDS`-th row, capped at the maximum.
fn downsample(rows: Vec<&ActivityRecord>) -> Vec<&ActivityRecord> {
    if rows.len() <= MAX_RENDER_RECORDS {
        return rows;
    }

    let stride = rows.len() / MAX_RENDER_RECORDS;
    debug!(
        "downsampling {} rows with stride {stride}",
        rows.len()
    );
    rows.into_iter()
        .step_by(stride)
        .take(MAX_RENDER_RECORDS)
        .collect()
}

/// Mean of all present endpoint coordinates in the sampled rows.
fn center_of(rows: &[&ActivityRecord]) -> LatLng {
    let mut lat_sum = 0.0;
    let mut lng_sum = 0.0;
    let mut count = 0usize;

    for row in rows {
        for point in [row.start, row.end].into_iter().flatten() {
            lat_sum += point.latitude;
            lng_sum += point.longitude;
            count += 1;
        }
    }

    if count == 0 {
        DEFAULT_CENTER
    } else {
        LatLng::new(lat_sum / count as f64, lng_sum / count as f64)
    }
}

// ============================================================================
// Filter Metadata
// ============================================================================

/// The filter options offered for the current model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSet {
    /// Distinct mode labels, sorted.
    pub transport_modes: Vec<String>,
    /// Distinct classified country names, sorted.
    pub countries: Vec<String>,
    /// Earliest activity start, `%Y-%m-%d`.
    pub min_date: Option<String>,
    /// Latest activity start, `%Y-%m-%d`.
    pub max_date: Option<String>,
}

/// Collect the filter metadata for a set of activity records.
pub fn build_filters(activities: &[ActivityRecord]) -> FilterSet {
    let mut modes: Vec<String> = activities
        .iter()
        .filter_map(|a| a.mode.clone())
        .collect();
    modes.sort();
    modes.dedup();

    let countries = crate::countries::activity_countries(activities)
        .into_iter()
        .map(str::to_string)
        .collect();

    let fmt = |t: &chrono::DateTime<chrono::Utc>| t.format("%Y-%m-%d").to_string();
    let min_date = activities.iter().map(|a| a.start_time).min();
    let max_date = activities.iter().map(|a| a.start_time).max();

    FilterSet {
        transport_modes: modes,
        countries,
        min_date: min_date.as_ref().map(fmt),
        max_date: max_date.as_ref().map(fmt),
    }
}

// ============================================================================
// Tests
// ============================================================================
