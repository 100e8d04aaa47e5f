//! Location subsystem: free-text city resolution over a geocoding API,
//! with fuzzy broadening and a deterministic tie-break.

pub mod matching;
pub mod providers;
pub mod resolver;
pub mod types;

pub use providers::{Geocoder, OpenWeatherGeocoder};
pub use resolver::{best_location, BestPick, LocationResolver};
pub use types::{
    DisambiguationPolicy, LocationCandidate, LocationError, LocationSource, Resolution,
    ResolvedLocation,
};
