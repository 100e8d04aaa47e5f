use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::auth::{bearer_token, AuthError, Credentials, TokenResponse};
use crate::error::SearchError;
use crate::location::{Resolution, ResolvedLocation};
use crate::report::{build_report, WeatherReport};
use crate::store::{Analytics, SearchRecord};
use crate::theme::TempUnit;
use crate::timezone::{local_time, zone_for};

use super::state::AppState;

// ─── GET /health ─────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "OK"
}

// ─── GET /api/resolve ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub city: Option<String>,
    pub country: Option<String>,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ResolvedLocation>, SearchError> {
    let start = Instant::now();

    let city = params.city.as_deref().map(str::trim).unwrap_or("");
    if city.is_empty() {
        return Err(SearchError::InputInvalid("Missing 'city' parameter".into()));
    }

    let resolved = locate(&state, city, params.country).await?;

    info!(
        query = city,
        resolved = %resolved.candidate.label(),
        source = %resolved.source,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/resolve"
    );
    Ok(Json(resolved))
}

/// Run the blocking resolver off the async runtime; ambiguity becomes an error
/// so handlers can answer it with a candidate list.
async fn locate(state: &AppState, city: &str, country: Option<String>) -> Result<ResolvedLocation, SearchError> {
    let resolver = state.resolver.clone();
    let city = city.to_string();
    let resolution = tokio::task::spawn_blocking(move || resolver.resolve(&city, country.as_deref())).await??;

    match resolution {
        Resolution::Located(resolved) => Ok(resolved),
        Resolution::Ambiguous { query, candidates } => Err(SearchError::Ambiguous { query, candidates }),
    }
}

// ─── GET /api/weather ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Serialize)]
pub struct WeatherPage {
    pub location: ResolvedLocation,
    pub timezone: String,
    #[serde(flatten)]
    pub report: WeatherReport,
}

pub async fn weather(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherPage>, SearchError> {
    let start = Instant::now();
    let unit = TempUnit::parse(params.unit.as_deref().unwrap_or("c"));

    let location = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(SearchError::InputInvalid(
                    "Invalid coordinates. Lat: -90..90, Lon: -180..180".into(),
                ));
            }
            ResolvedLocation::manual(lat, lon)
        }
        (None, None) => {
            let city = params.city.as_deref().map(str::trim).unwrap_or("");
            if city.is_empty() {
                return Err(SearchError::InputInvalid(
                    "Provide 'city' or 'lat'+'lon' parameters".into(),
                ));
            }
            locate(&state, city, params.country.clone()).await?
        }
        _ => {
            return Err(SearchError::InputInvalid("Both 'lat' and 'lon' are required".into()));
        }
    };

    let (lat, lon) = (location.lat(), location.lon());
    let current_client = state.current.clone();
    let forecast_client = state.forecast.clone();
    let lookup = Arc::clone(&state.timezone);

    let (current, forecast, zone) = tokio::task::spawn_blocking(move || -> Result<_, SearchError> {
        let current = current_client.current(lat, lon)?;
        let forecast = forecast_client.fetch(lat, lon)?;
        let zone = zone_for(forecast.timezone.as_deref(), lookup.as_ref(), lat, lon)?;
        Ok((current, forecast, zone))
    })
    .await??;

    let now = local_time(zone, Utc::now());
    let report = build_report(&forecast, &current, now, unit, &state.theme)?;

    let record = SearchRecord {
        city: location.candidate.name.clone(),
        country: Some(location.candidate.country.clone()).filter(|c| !c.is_empty()),
        lat,
        lon,
        temp_unit: unit.code().to_string(),
        user_id: authenticated_user(&state, &headers),
    };
    state.store.record_search(&record).await;

    info!(
        location = %location.candidate.label(),
        theme = %report.theme.image_type,
        user_id = ?record.user_id,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/weather"
    );

    Ok(Json(WeatherPage {
        location,
        timezone: zone.name().to_string(),
        report,
    }))
}

/// User id from a valid bearer token; anything else is an anonymous search.
fn authenticated_user(state: &AppState, headers: &HeaderMap) -> Option<i64> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)?;

    match state.auth.verify_token(token) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(error = %e, "ignoring bearer token");
            None
        }
    }
}

// ─── POST /auth/signup, /auth/login ──────────────────────────────

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenResponse>, AuthError> {
    state.auth.signup(credentials).await.map(Json)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenResponse>, AuthError> {
    state.auth.login(credentials).await.map(Json)
}

// ─── GET /api/analytics ──────────────────────────────────────────

pub async fn analytics(State(state): State<Arc<AppState>>) -> Result<Json<Analytics>, SearchError> {
    Ok(Json(state.store.analytics(Utc::now()).await?))
}
