//! Local time at a coordinate: IANA zone lookup and wall-clock conversion.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::location::providers::build_agent;

#[derive(Debug, Error)]
pub enum TimezoneError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid timezone response: {0}")]
    InvalidResponse(String),
    #[error("Unknown timezone '{0}'")]
    UnknownZone(String),
}

/// Coordinate → IANA time zone.
pub trait TimezoneLookup: Send + Sync {
    fn zone_at(&self, lat: f64, lon: f64) -> Result<Tz, TimezoneError>;
}

/// Parse an IANA zone name ("Europe/Berlin").
pub fn parse_zone(name: &str) -> Result<Tz, TimezoneError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimezoneError::UnknownZone(name.to_string()))
}

/// Wall-clock time in `tz` at instant `at`.
pub fn local_time(tz: Tz, at: DateTime<Utc>) -> NaiveDateTime {
    at.with_timezone(&tz).naive_local()
}

/// Pick the zone for a forecast: the zone the forecast already reports
/// when it names a valid one, otherwise a lookup by coordinates.
pub fn zone_for(
    reported: Option<&str>,
    lookup: &dyn TimezoneLookup,
    lat: f64,
    lon: f64,
) -> Result<Tz, TimezoneError> {
    if let Some(tz) = reported.and_then(|name| parse_zone(name).ok()) {
        return Ok(tz);
    }
    debug!(lat, lon, ?reported, "forecast zone unusable, looking up by coordinates");
    lookup.zone_at(lat, lon)
}

// ─── timeapi.io ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CoordinateZone {
    time_zone: String,
}

/// timeapi.io `/api/TimeZone/coordinate` client.
#[derive(Clone)]
pub struct TimeApiLookup {
    agent: ureq::Agent,
    base_url: String,
}

impl TimeApiLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl TimezoneLookup for TimeApiLookup {
    fn zone_at(&self, lat: f64, lon: f64) -> Result<Tz, TimezoneError> {
        let url = format!(
            "{}/api/TimeZone/coordinate?latitude={}&longitude={}",
            self.base_url, lat, lon
        );
        let body = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| TimezoneError::Network(e.to_string()))?
            .into_string()
            .map_err(|e| TimezoneError::Network(e.to_string()))?;
        let parsed: CoordinateZone =
            serde_json::from_str(&body).map_err(|e| TimezoneError::InvalidResponse(e.to_string()))?;
        parse_zone(&parsed.time_zone)
    }
}
