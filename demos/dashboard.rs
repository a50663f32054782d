//! Walk through every engine query against a small in-memory export.
//!
//! Run with: cargo run --example dashboard

use journey_engine::{
    AddressFields, GeocodeError, MapQuery, ReverseGeocoder, TimelineEngine,
};
use std::time::Duration;

// Offline stand-in so the demo never calls the public geocoding service.
struct OfflineGeocoder;

impl ReverseGeocoder for OfflineGeocoder {
    fn reverse(
        &self,
        lat: f64,
        _lng: f64,
        _timeout: Duration,
    ) -> Result<AddressFields, GeocodeError> {
        let (city, country) = if lat > 44.0 {
            ("Lyon", "France")
        } else {
            ("Barcelona", "Spain")
        };
        Ok(AddressFields {
            display_name: format!("{city}, {country}"),
            city: Some(city.to_string()),
            state: None,
            country: Some(country.to_string()),
            country_code: None,
        })
    }
}

fn main() {
    env_logger::init();

    let export = r#"{
        "semanticSegments": [
            {"startTime": "2025-06-12T08:00:00Z", "endTime": "2025-06-12T12:00:00Z",
             "activity": {
                "start": {"latLng": "45.7640°, 4.8357°"},
                "end": {"latLng": "43.6047°, 1.4442°"},
                "distanceMeters": 360000.0,
                "topCandidate": {"type": "IN_PASSENGER_VEHICLE"}
             }},
            {"startTime": "2025-06-12T12:00:00Z", "endTime": "2025-06-13T09:00:00Z",
             "visit": {"topCandidate": {"placeLocation": {"latLng": "43.6047°, 1.4442°"}}}},
            {"startTime": "2025-06-13T09:00:00Z", "endTime": "2025-06-13T15:00:00Z",
             "activity": {
                "start": {"latLng": "43.6047°, 1.4442°"},
                "end": {"latLng": "41.3874°, 2.1686°"},
                "distanceMeters": 395000.0,
                "topCandidate": {"type": "IN_PASSENGER_VEHICLE"}
             }},
            {"startTime": "2025-06-13T15:00:00Z", "endTime": "2025-06-14T10:00:00Z",
             "visit": {"topCandidate": {"placeLocation": {"latLng": "41.3874°, 2.1686°"}}}},
            {"startTime": "2025-06-14T10:00:00Z", "endTime": "2025-06-14T11:00:00Z",
             "activity": {
                "start": {"latLng": "41.3874°, 2.1686°"},
                "end": {"latLng": "41.4036°, 2.1744°"},
                "distanceMeters": 2400.0,
                "topCandidate": {"type": "WALKING"}
             }}
        ]
    }"#;

    let parsed = journey_engine::parse_export(export).expect("demo export is well-formed");
    let engine = TimelineEngine::with_geocoder(parsed, Box::new(OfflineGeocoder));

    println!("Journey Engine Demo\n");

    // Dashboard statistics
    let stats = engine.dashboard_stats();
    println!("1. Dashboard statistics:");
    println!("   Vehicle distance: {} km", stats.vehicle_distance_km);
    println!("   Walking distance: {} km", stats.walking_distance_km);
    println!("   Countries visited: {}", stats.countries_visited);
    println!("   Days on the road: {}", stats.days_on_road);
    println!("   Current location: {}", stats.current_location);
    println!("   Most common activity: {}\n", stats.most_common_activity);

    // Map rows
    let points = engine.map_data(None);
    println!("2. Map rows ({}):", points.len());
    for point in &points {
        println!(
            "   {} {} -> {} ({:.0}m, {})",
            point.start_time,
            point.start_location.unwrap_or("?"),
            point.end_location.unwrap_or("?"),
            point.distance_meters,
            point.activity_type
        );
    }
    println!();

    // Recent stops
    println!("3. Recent stops:");
    for stop in engine.recent_stops(5) {
        println!(
            "   {} ({:.1}h, from {})",
            stop.name, stop.duration_hours, stop.start_time
        );
    }
    println!();

    // Rendered map view
    let view = engine.renderable_map(&MapQuery::default());
    println!("4. {}:", view.title);
    println!(
        "   Center: {:.4}, {:.4} (zoom {})",
        view.center.latitude, view.center.longitude, view.zoom
    );
    for trace in &view.traces {
        println!(
            "   Trace \"{}\" ({}): {} array entries",
            trace.name,
            trace.color,
            trace.lats.len()
        );
    }
    println!();

    // Filter metadata
    let filters = engine.available_filters();
    println!("5. Available filters:");
    println!("   Modes: {:?}", filters.transport_modes);
    println!("   Countries: {:?}", filters.countries);
    println!(
        "   Date span: {} .. {}",
        filters.min_date.as_deref().unwrap_or("-"),
        filters.max_date.as_deref().unwrap_or("-")
    );
}
