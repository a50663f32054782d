//! Reverse geocoding with a bounded memoization cache.
//!
//! Lookups go through [`GeocodeCache`], which memoizes results in an LRU
//! store keyed by the exact coordinate pair, spaces out outbound provider
//! calls to respect rate limits, and absorbs provider failures into a
//! synthesized placeholder. Callers always receive a usable display string;
//! failures are never surfaced and never cached, so a later call with the
//! same coordinates retries the provider.

use crate::LatLng;
use log::{debug, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("journey-engine/", env!("CARGO_PKG_VERSION"));

/// Failure reported by a reverse-geocoding provider.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("provider timeout: {0}")]
    Timeout(String),
    #[error("provider error: {0}")]
    Service(String),
    #[error("{0}")]
    Other(String),
}

/// Raw address fields returned by a provider.
#[derive(Debug, Clone, Default)]
pub struct AddressFields {
    pub display_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// A reverse-geocoding collaborator.
///
/// The trait is the seam between the cache policy and the outbound provider;
/// tests substitute a scripted implementation.
pub trait ReverseGeocoder: Send + Sync {
    fn reverse(&self, lat: f64, lng: f64, timeout: Duration) -> Result<AddressFields, GeocodeError>;
}

// ============================================================================
// Nominatim Provider
// ============================================================================

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

/// Best-effort reverse geocoding against the public Nominatim service.
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Create a geocoder against the public Nominatim endpoint.
    pub fn new() -> Self {
        Self::with_base_url(NOMINATIM_URL)
    }

    /// Create a geocoder against a custom endpoint (e.g. a self-hosted
    /// instance).
    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!("failed to build geocoding HTTP client, using default: {e}");
                reqwest::blocking::Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn address_fields(response: NominatimResponse) -> AddressFields {
        let address = response.address;
        let city = address.city.or(address.town).or(address.village);

        // Nominatim omits the structured country for some features; fall back
        // to the last component of the display name.
        let country = address.country.or_else(|| {
            response
                .display_name
                .rsplit(", ")
                .next()
                .filter(|part| !part.is_empty())
                .map(str::to_string)
        });

        AddressFields {
            display_name: response.display_name,
            city,
            state: address.state,
            country,
            country_code: address.country_code.map(|c| c.to_uppercase()),
        }
    }
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, lat: f64, lng: f64, timeout: Duration) -> Result<AddressFields, GeocodeError> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&zoom=14&addressdetails=1",
            self.base_url, lat, lng
        );

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout(e.to_string())
                } else {
                    GeocodeError::Service(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Service(format!("HTTP {status}")));
        }

        let body: NominatimResponse = response
            .json()
            .map_err(|e| GeocodeError::Other(format!("unparseable response: {e}")))?;

        Ok(Self::address_fields(body))
    }
}

// ============================================================================
// Geocode Cache
// ============================================================================

/// The resolved (or synthesized) answer for one coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub country_code: String,
    pub display_name: String,
    /// True when the provider answered; false for the synthesized
    /// placeholder, so callers can audit fallbacks.
    pub resolved: bool,
}

impl GeocodeResult {
    /// The fallback returned when the provider cannot answer. Never an error
    /// value: the display string is always usable.
    pub fn placeholder(lat: f64, lng: f64) -> Self {
        Self {
            name: format!("Location at {lat:.4}, {lng:.4}"),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            country_code: String::new(),
            display_name: format!("Unknown location at {lat:.4}, {lng:.4}"),
            resolved: false,
        }
    }

    fn from_fields(fields: AddressFields) -> Self {
        Self {
            name: fields.display_name.clone(),
            city: fields.city.unwrap_or_default(),
            state: fields.state.unwrap_or_default(),
            country: fields.country.unwrap_or_default(),
            country_code: fields.country_code.unwrap_or_default(),
            display_name: fields.display_name,
            resolved: true,
        }
    }
}

/// Cache and provider-call policy knobs.
#[derive(Debug, Clone)]
pub struct GeocodeCacheConfig {
    /// Maximum memoized entries before least-recently-used eviction.
    pub capacity: NonZeroUsize,
    /// Minimum delay imposed before each outbound call.
    pub min_call_interval: Duration,
    /// Fixed per-call provider timeout.
    pub call_timeout: Duration,
    /// Wait after a provider timeout or service error.
    pub failure_backoff: Duration,
}

impl Default for GeocodeCacheConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(2000).expect("capacity is non-zero"),
            min_call_interval: Duration::from_millis(150),
            call_timeout: Duration::from_secs(15),
            failure_backoff: Duration::from_secs(1),
        }
    }
}

// Exact f64 bit patterns; two lookups share an entry only when the
// coordinates are bit-identical.
type CacheKey = (u64, u64);

/// Memoized reverse geocoding with rate limiting and failure fallback.
pub struct GeocodeCache {
    geocoder: Box<dyn ReverseGeocoder>,
    entries: Mutex<LruCache<CacheKey, GeocodeResult>>,
    next_dispatch: Mutex<Instant>,
    config: GeocodeCacheConfig,
}

impl GeocodeCache {
    pub fn new(geocoder: Box<dyn ReverseGeocoder>) -> Self {
        Self::with_config(geocoder, GeocodeCacheConfig::default())
    }

    pub fn with_config(geocoder: Box<dyn ReverseGeocoder>, config: GeocodeCacheConfig) -> Self {
        Self {
            geocoder,
            entries: Mutex::new(LruCache::new(config.capacity)),
            next_dispatch: Mutex::new(Instant::now()),
            config,
        }
    }

    /// Resolve a coordinate pair to a display-ready result.
    ///
    /// A cache hit returns immediately. A miss waits for a dispatch slot,
    /// performs one outbound call with the fixed timeout, and caches only a
    /// successful answer. Provider timeouts and service errors back off for
    /// [`GeocodeCacheConfig::failure_backoff`] and yield the placeholder; any
    /// other failure yields the placeholder without the extra wait.
    pub fn resolve(&self, point: LatLng) -> GeocodeResult {
        let key = (point.latitude.to_bits(), point.longitude.to_bits());

        if let Some(hit) = self.entries.lock().unwrap().get(&key) {
            return hit.clone();
        }

        self.wait_for_dispatch_slot();
        debug!(
            "geocode miss, querying provider for {:.4}, {:.4}",
            point.latitude, point.longitude
        );

        match self
            .geocoder
            .reverse(point.latitude, point.longitude, self.config.call_timeout)
        {
            Ok(fields) => {
                let result = GeocodeResult::from_fields(fields);
                self.entries.lock().unwrap().put(key, result.clone());
                result
            }
            Err(err @ (GeocodeError::Timeout(_) | GeocodeError::Service(_))) => {
                warn!(
                    "geocoding failed for {:.4}, {:.4}: {err}",
                    point.latitude, point.longitude
                );
                std::thread::sleep(self.config.failure_backoff);
                GeocodeResult::placeholder(point.latitude, point.longitude)
            }
            Err(err) => {
                warn!(
                    "geocoding failed for {:.4}, {:.4}: {err}",
                    point.latitude, point.longitude
                );
                GeocodeResult::placeholder(point.latitude, point.longitude)
            }
        }
    }

    /// Number of memoized entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Each caller reserves a slot min_call_interval after the previous one,
    // then sleeps outside the lock until its slot arrives.
    fn wait_for_dispatch_slot(&self) {
        let wait = {
            let mut next = self.next_dispatch.lock().unwrap();
            let now = Instant::now();
            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.config.min_call_interval;
            dispatch_at.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedGeocoder {
        calls: AtomicU32,
        fail: bool,
    }

    impl ScriptedGeocoder {
        fn ok() -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), fail: true })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl ReverseGeocoder for Arc<ScriptedGeocoder> {
        fn reverse(
            &self,
            lat: f64,
            _lng: f64,
            _timeout: Duration,
        ) -> Result<AddressFields, GeocodeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(GeocodeError::Service("HTTP 503".into()));
            }
            Ok(AddressFields {
                display_name: format!("Somewhere at {lat}"),
                city: Some("Zurich".into()),
                state: Some("ZH".into()),
                country: Some("Switzerland".into()),
                country_code: Some("CH".into()),
            })
        }
    }

    fn fast_config(capacity: usize) -> GeocodeCacheConfig {
        GeocodeCacheConfig {
            capacity: NonZeroUsize::new(capacity).unwrap(),
            min_call_interval: Duration::ZERO,
            call_timeout: Duration::from_secs(1),
            failure_backoff: Duration::ZERO,
        }
    }

    fn cache_over(geocoder: &Arc<ScriptedGeocoder>, capacity: usize) -> GeocodeCache {
        GeocodeCache::with_config(Box::new(Arc::clone(geocoder)), fast_config(capacity))
    }

    #[test]
    fn test_repeated_lookup_hits_provider_once() {
        let geocoder = ScriptedGeocoder::ok();
        let cache = cache_over(&geocoder, 10);

        let first = cache.resolve(LatLng::new(47.37, 8.54));
        let second = cache.resolve(LatLng::new(47.37, 8.54));

        assert_eq!(geocoder.call_count(), 1);
        assert_eq!(first, second);
        assert!(first.resolved);
        assert_eq!(first.city, "Zurich");
    }

    #[test]
    fn test_failure_yields_placeholder_and_is_not_cached() {
        let geocoder = ScriptedGeocoder::failing();
        let cache = cache_over(&geocoder, 10);

        let result = cache.resolve(LatLng::new(47.37, 8.54));
        assert!(!result.resolved);
        assert_eq!(result.name, "Location at 47.3700, 8.5400");
        assert!(result.city.is_empty());
        assert!(cache.is_empty());

        // A later identical lookup retries the provider.
        cache.resolve(LatLng::new(47.37, 8.54));
        assert_eq!(geocoder.call_count(), 2);
    }

    #[test]
    fn test_lru_eviction_once_full() {
        let geocoder = ScriptedGeocoder::ok();
        let cache = cache_over(&geocoder, 2);

        cache.resolve(LatLng::new(1.0, 1.0));
        cache.resolve(LatLng::new(2.0, 2.0));
        cache.resolve(LatLng::new(1.0, 1.0)); // refresh recency of (1,1)
        cache.resolve(LatLng::new(3.0, 3.0)); // evicts (2,2)
        assert_eq!(cache.len(), 2);

        cache.resolve(LatLng::new(1.0, 1.0)); // still cached
        assert_eq!(geocoder.call_count(), 3);

        cache.resolve(LatLng::new(2.0, 2.0)); // evicted, refetched
        assert_eq!(geocoder.call_count(), 4);
    }

    #[test]
    fn test_dispatch_spacing_reserves_slots() {
        let geocoder = ScriptedGeocoder::ok();
        let config = GeocodeCacheConfig {
            min_call_interval: Duration::from_millis(40),
            ..fast_config(10)
        };
        let cache = GeocodeCache::with_config(Box::new(Arc::clone(&geocoder)), config);

        let start = Instant::now();
        cache.resolve(LatLng::new(1.0, 1.0));
        cache.resolve(LatLng::new(2.0, 2.0));
        assert!(start.elapsed() >= Duration::from_millis(40));

        // Hits never wait for a slot.
        let hit_start = Instant::now();
        cache.resolve(LatLng::new(1.0, 1.0));
        assert!(hit_start.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_nominatim_city_fallback_chain() {
        let response = NominatimResponse {
            display_name: "Kirchgasse, Altstadt, Zurich, Switzerland".into(),
            address: NominatimAddress {
                city: None,
                town: None,
                village: Some("Altstadt".into()),
                state: Some("Zurich".into()),
                country: None,
                country_code: Some("ch".into()),
            },
        };

        let fields = NominatimGeocoder::address_fields(response);
        assert_eq!(fields.city.as_deref(), Some("Altstadt"));
        // Country recovered from the display name tail.
        assert_eq!(fields.country.as_deref(), Some("Switzerland"));
        assert_eq!(fields.country_code.as_deref(), Some("CH"));
    }
}
