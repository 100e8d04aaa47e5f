//! Geocoding providers: the `Geocoder` seam and the OpenWeather implementation.

use super::types::{LocationCandidate, LocationError};
use serde::Deserialize;
use std::time::Duration;

/// Forward geocoding: free text → candidate places.
pub trait Geocoder: Send + Sync {
    /// Look up `query` ("Paris" or "Paris,FR"), returning at most `limit`
    /// candidates. Transport and HTTP failures are errors.
    fn direct(&self, query: &str, limit: usize) -> Result<Vec<LocationCandidate>, LocationError>;
}

// ─── OpenWeather direct geocoding ───────────────────────────────

#[derive(Deserialize, Debug)]
struct DirectResult {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

impl DirectResult {
    /// Results without coordinates are useless downstream and are dropped.
    fn into_candidate(self) -> Option<LocationCandidate> {
        Some(LocationCandidate {
            lat: self.lat?,
            lon: self.lon?,
            name: self.name,
            state: self.state.filter(|s| !s.trim().is_empty()),
            country: self.country.unwrap_or_default().to_uppercase(),
        })
    }
}

/// OpenWeather `/geo/1.0/direct` client.
#[derive(Clone)]
pub struct OpenWeatherGeocoder {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl OpenWeatherGeocoder {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl Geocoder for OpenWeatherGeocoder {
    fn direct(&self, query: &str, limit: usize) -> Result<Vec<LocationCandidate>, LocationError> {
        let url = format!(
            "{}/geo/1.0/direct?q={}&limit={}&appid={}",
            self.base_url,
            urlencode(query),
            limit,
            urlencode(&self.api_key),
        );

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| LocationError::Network(e.to_string()))?;

        let results: Vec<DirectResult> = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        Ok(results
            .into_iter()
            .filter_map(DirectResult::into_candidate)
            .take(limit)
            .collect())
    }
}

// ─── HTTP helpers ───────────────────────────────────────────────

/// Blocking agent shared by every upstream client.
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("skytheme/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Percent-encode a query parameter value.
pub fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
