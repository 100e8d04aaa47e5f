//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One geocoding result: a named place with coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub name: String,
    /// State or province, when the geocoder reports one.
    #[serde(default)]
    pub state: Option<String>,
    /// ISO 3166-1 alpha-2 country code, or empty.
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl LocationCandidate {
    pub fn is_us(&self) -> bool {
        self.country.eq_ignore_ascii_case("US")
    }

    pub fn has_state(&self) -> bool {
        self.state.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// "Springfield, Illinois, US"
    pub fn label(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(state) = self.state.as_deref().filter(|s| !s.is_empty()) {
            parts.push(state);
        }
        if !self.country.is_empty() {
            parts.push(self.country.as_str());
        }
        parts.join(", ")
    }

    pub(crate) fn dedup_key(&self) -> (String, String, String) {
        (
            self.name.clone(),
            self.state.clone().unwrap_or_default(),
            self.country.clone(),
        )
    }
}

/// How a location was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    /// Chosen from the literal geocoder query.
    Literal,
    /// Chosen after fuzzy broadening.
    Broadened,
    /// Coordinates supplied by the caller.
    Manual,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "Geocoder"),
            Self::Broadened => write!(f, "Fuzzy"),
            Self::Manual => write!(f, "Manual"),
        }
    }
}

/// The authoritative location for one search.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLocation {
    #[serde(flatten)]
    pub candidate: LocationCandidate,
    pub source: LocationSource,
    /// Similarity score when the candidate came out of broadening.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ResolvedLocation {
    pub fn lat(&self) -> f64 {
        self.candidate.lat
    }

    pub fn lon(&self) -> f64 {
        self.candidate.lon
    }

    /// A location built from caller-supplied coordinates.
    pub fn manual(lat: f64, lon: f64) -> Self {
        Self {
            candidate: LocationCandidate {
                name: format!("{:.4}, {:.4}", lat, lon),
                state: None,
                country: String::new(),
                lat,
                lon,
            },
            source: LocationSource::Manual,
            score: None,
        }
    }
}

/// Successful outcome of a city lookup.
#[derive(Debug, Clone)]
pub enum Resolution {
    Located(ResolvedLocation),
    /// Several meaningfully different places remain; the caller must choose.
    Ambiguous {
        query: String,
        candidates: Vec<LocationCandidate>,
    },
}

/// What to do when the geocoder returns more than one usable candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisambiguationPolicy {
    /// Always hand multiple candidates back to the user.
    PresentAll,
    /// Run the best-location heuristic and only ask when it cannot decide.
    #[default]
    BestPick,
}

/// Location resolution errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("City name must be at least 2 characters")]
    InputTooShort,
    #[error("No results for '{0}'")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn springfield(state: Option<&str>) -> LocationCandidate {
        LocationCandidate {
            name: "Springfield".into(),
            state: state.map(String::from),
            country: "US".into(),
            lat: 39.8,
            lon: -89.6,
        }
    }

    #[test]
    fn test_label_with_state() {
        assert_eq!(springfield(Some("Illinois")).label(), "Springfield, Illinois, US");
        assert_eq!(springfield(None).label(), "Springfield, US");
    }

    #[test]
    fn test_blank_state_is_not_a_state() {
        assert!(!springfield(Some("  ")).has_state());
        assert!(springfield(Some("Ohio")).has_state());
    }

    #[test]
    fn test_manual_location_keeps_coordinates() {
        let loc = ResolvedLocation::manual(59.33, 18.07);
        assert_eq!(loc.source, LocationSource::Manual);
        assert_eq!(loc.candidate.name, "59.3300, 18.0700");
        assert_eq!(loc.lat(), 59.33);
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let p: DisambiguationPolicy = serde_json::from_str("\"present_all\"").unwrap();
        assert_eq!(p, DisambiguationPolicy::PresentAll);
    }
}
