//! Geocoding providers: Nominatim, Photon, and the key-gated OpenCage.
//!
//! Two seams: `GeocodeBackend` is one raw HTTP lookup, `LookupStage` is
//! a pipeline stage built on top of it (query generation, candidate
//! iteration, politeness pauses). Transient failures never escape a
//! stage — a miss is a miss, whatever the cause.

use super::queries::{self, PlaceKeyword, PLACE_KEYWORDS};
use super::types::{GeocodeConfig, GeocodeError, LocationRecord, PlaceContext};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "geostage/0.3 (titled-block geocoder)";

/// A successful lookup: coordinates plus the exact query that hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub query: String,
}

/// One raw lookup against an external geocoder.
///
/// `Ok(None)` means the provider answered but had no match. `Err` covers
/// transport and decode trouble; stages downgrade it to a warned miss.
pub trait GeocodeBackend {
    fn geocode(&self, query: &str, timeout: Duration) -> Result<Option<(f64, f64)>, GeocodeError>;
}

/// One pipeline stage: a lookup strategy bound to a provenance tag.
pub trait LookupStage {
    /// Tag recorded on coordinates this stage produces.
    fn method(&self) -> &'static str;

    /// Whether the stage can run at all (credential present, etc.).
    fn available(&self) -> bool {
        true
    }

    /// Try to resolve one record. `None` covers every recoverable
    /// failure: no match, timeout, provider trouble, malformed body.
    fn lookup(&self, record: &LocationRecord, ctx: &PlaceContext) -> Option<Fix>;
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

// ─── Nominatim backend ──────────────────────────────────────────

#[derive(Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
}

fn nominatim_latlon(results: &[NominatimResult]) -> Option<(f64, f64)> {
    let first = results.first()?;
    Some((first.lat.parse().ok()?, first.lon.parse().ok()?))
}

pub struct NominatimBackend;

impl GeocodeBackend for NominatimBackend {
    fn geocode(&self, query: &str, timeout: Duration) -> Result<Option<(f64, f64)>, GeocodeError> {
        let url = format!(
            "https://nominatim.openstreetmap.org/search?q={}&format=json&limit=1",
            urlencod(query),
        );
        let response = ureq::get(&url)
            .set("User-Agent", USER_AGENT)
            .timeout(timeout)
            .call()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;
        let results: Vec<NominatimResult> = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
        Ok(nominatim_latlon(&results))
    }
}

// ─── Photon backend ─────────────────────────────────────────────

#[derive(Deserialize)]
struct PhotonResponse {
    #[serde(default)]
    features: Vec<PhotonFeature>,
}

#[derive(Deserialize)]
struct PhotonFeature {
    geometry: PhotonGeometry,
}

#[derive(Deserialize)]
struct PhotonGeometry {
    // GeoJSON order: [lon, lat]
    coordinates: Vec<f64>,
}

fn photon_latlon(response: &PhotonResponse) -> Option<(f64, f64)> {
    match response.features.first()?.geometry.coordinates.as_slice() {
        [lon, lat, ..] => Some((*lat, *lon)),
        _ => None,
    }
}

pub struct PhotonBackend;

impl GeocodeBackend for PhotonBackend {
    fn geocode(&self, query: &str, timeout: Duration) -> Result<Option<(f64, f64)>, GeocodeError> {
        let url = format!(
            "https://photon.komoot.io/api?q={}&limit=1",
            urlencod(query),
        );
        let response = ureq::get(&url)
            .set("User-Agent", USER_AGENT)
            .timeout(timeout)
            .call()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;
        let parsed: PhotonResponse = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
        Ok(photon_latlon(&parsed))
    }
}

// ─── OpenCage backend ───────────────────────────────────────────

#[derive(Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

#[derive(Deserialize)]
struct OpenCageResult {
    geometry: OpenCageGeometry,
}

#[derive(Deserialize)]
struct OpenCageGeometry {
    lat: f64,
    lng: f64,
}

fn opencage_latlon(response: &OpenCageResponse) -> Option<(f64, f64)> {
    response
        .results
        .first()
        .map(|r| (r.geometry.lat, r.geometry.lng))
}

pub struct OpenCageBackend {
    key: String,
    country_code: String,
}

impl OpenCageBackend {
    pub fn new(key: String, country_code: String) -> Self {
        Self { key, country_code }
    }
}

impl GeocodeBackend for OpenCageBackend {
    fn geocode(&self, query: &str, timeout: Duration) -> Result<Option<(f64, f64)>, GeocodeError> {
        let url = format!(
            "https://api.opencagedata.com/geocode/v1/json?q={}&key={}&countrycode={}&limit=1&no_annotations=1",
            urlencod(query),
            urlencod(&self.key),
            urlencod(&self.country_code),
        );
        let response = ureq::get(&url)
            .set("User-Agent", USER_AGENT)
            .timeout(timeout)
            .call()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;
        let parsed: OpenCageResponse = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
        Ok(opencage_latlon(&parsed))
    }
}

// ─── Stage adapters ─────────────────────────────────────────────

/// One attempt against a backend, downgrading errors to a warned miss.
/// Pauses after the call regardless of outcome.
fn attempt<B: GeocodeBackend>(
    backend: &B,
    method: &str,
    query: &str,
    timeout: Duration,
    delay: Duration,
) -> Option<(f64, f64)> {
    let hit = match backend.geocode(query, timeout) {
        Ok(hit) => hit,
        Err(e) => {
            eprintln!("  warning: {} lookup failed for '{}': {}", method, query, e);
            None
        }
    };
    pause(delay);
    hit
}

/// Iterate candidates until one hits.
fn attempt_each<B: GeocodeBackend>(
    backend: &B,
    method: &str,
    candidates: &[String],
    timeout: Duration,
    delay: Duration,
) -> Option<Fix> {
    for query in candidates {
        if let Some((latitude, longitude)) = attempt(backend, method, query, timeout, delay) {
            return Some(Fix {
                latitude,
                longitude,
                query: query.clone(),
            });
        }
    }
    None
}

/// Stage 1: a single comma-joined query against Nominatim.
pub struct BasicLookup<B: GeocodeBackend = NominatimBackend> {
    backend: B,
    timeout: Duration,
    delay: Duration,
}

impl BasicLookup<NominatimBackend> {
    pub fn new(config: &GeocodeConfig) -> Self {
        Self::with_backend(NominatimBackend, config)
    }
}

impl<B: GeocodeBackend> BasicLookup<B> {
    /// Build over a specific backend (for testing).
    pub fn with_backend(backend: B, config: &GeocodeConfig) -> Self {
        Self {
            backend,
            timeout: config.timeout,
            delay: config.delay,
        }
    }
}

impl<B: GeocodeBackend> LookupStage for BasicLookup<B> {
    fn method(&self) -> &'static str {
        "nominatim_basic"
    }

    fn lookup(&self, record: &LocationRecord, ctx: &PlaceContext) -> Option<Fix> {
        let query = queries::basic_query(&record.title, ctx);
        let (latitude, longitude) =
            attempt(&self.backend, self.method(), &query, self.timeout, self.delay)?;
        Some(Fix {
            latitude,
            longitude,
            query,
        })
    }
}

/// Stage 2: the full variant list against Nominatim, first hit wins.
pub struct EnhancedLookup<B: GeocodeBackend = NominatimBackend> {
    backend: B,
    keywords: &'static [PlaceKeyword],
    timeout: Duration,
    delay: Duration,
}

impl EnhancedLookup<NominatimBackend> {
    pub fn new(config: &GeocodeConfig) -> Self {
        Self::with_backend(NominatimBackend, config)
    }
}

impl<B: GeocodeBackend> EnhancedLookup<B> {
    pub fn with_backend(backend: B, config: &GeocodeConfig) -> Self {
        Self {
            backend,
            keywords: PLACE_KEYWORDS,
            timeout: config.timeout,
            delay: config.delay,
        }
    }

    /// Swap the content-scan table.
    pub fn with_keywords(mut self, keywords: &'static [PlaceKeyword]) -> Self {
        self.keywords = keywords;
        self
    }
}

impl<B: GeocodeBackend> LookupStage for EnhancedLookup<B> {
    fn method(&self) -> &'static str {
        "nominatim_variants"
    }

    fn lookup(&self, record: &LocationRecord, ctx: &PlaceContext) -> Option<Fix> {
        let candidates = queries::variant_queries(&record.title, &record.content, ctx, self.keywords);
        attempt_each(&self.backend, self.method(), &candidates, self.timeout, self.delay)
    }
}

/// Stage 3: the same variant iteration against Photon.
pub struct PhotonLookup<B: GeocodeBackend = PhotonBackend> {
    backend: B,
    keywords: &'static [PlaceKeyword],
    timeout: Duration,
    delay: Duration,
}

impl PhotonLookup<PhotonBackend> {
    pub fn new(config: &GeocodeConfig) -> Self {
        Self::with_backend(PhotonBackend, config)
    }
}

impl<B: GeocodeBackend> PhotonLookup<B> {
    pub fn with_backend(backend: B, config: &GeocodeConfig) -> Self {
        Self {
            backend,
            keywords: PLACE_KEYWORDS,
            timeout: config.timeout,
            delay: config.delay,
        }
    }
}

impl<B: GeocodeBackend> LookupStage for PhotonLookup<B> {
    fn method(&self) -> &'static str {
        "photon"
    }

    fn lookup(&self, record: &LocationRecord, ctx: &PlaceContext) -> Option<Fix> {
        let candidates = queries::variant_queries(&record.title, &record.content, ctx, self.keywords);
        attempt_each(&self.backend, self.method(), &candidates, self.timeout, self.delay)
    }
}

/// Stage 4: OpenCage, single query, skipped entirely without a key.
pub struct OpenCageLookup<B: GeocodeBackend = OpenCageBackend> {
    backend: Option<B>,
    timeout: Duration,
    delay: Duration,
}

impl OpenCageLookup<OpenCageBackend> {
    pub fn new(config: &GeocodeConfig) -> Self {
        let backend = config
            .opencage_key
            .clone()
            .map(|key| OpenCageBackend::new(key, config.country_code.clone()));
        Self {
            backend,
            timeout: config.timeout,
            delay: config.delay,
        }
    }
}

impl<B: GeocodeBackend> OpenCageLookup<B> {
    /// Build over a specific backend, or `None` to model a missing key
    /// (for testing).
    pub fn with_backend(backend: Option<B>, config: &GeocodeConfig) -> Self {
        Self {
            backend,
            timeout: config.timeout,
            delay: config.delay,
        }
    }
}

impl<B: GeocodeBackend> LookupStage for OpenCageLookup<B> {
    fn method(&self) -> &'static str {
        "opencage"
    }

    fn available(&self) -> bool {
        self.backend.is_some()
    }

    fn lookup(&self, record: &LocationRecord, ctx: &PlaceContext) -> Option<Fix> {
        let backend = self.backend.as_ref()?;
        let query = queries::basic_query(&record.title, ctx);
        let (latitude, longitude) =
            attempt(backend, self.method(), &query, self.timeout, self.delay)?;
        Some(Fix {
            latitude,
            longitude,
            query,
        })
    }
}

// ─── URL encoding (minimal, no extra dep) ───────────────────────

/// Percent-encode the UTF-8 bytes of a query component.
fn urlencod(s: &str) -> String {
    let mut out = String::new();
    for &b in s.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
