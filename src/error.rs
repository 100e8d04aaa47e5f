//! Search-facing error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::forecast::ForecastError;
use crate::location::{LocationCandidate, LocationError};
use crate::store::StoreError;
use crate::timezone::TimezoneError;

/// Message shown for any upstream weather failure.
pub const UPSTREAM_MESSAGE: &str = "Weather data could not be loaded.";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    InputInvalid(String),
    #[error("No location found for '{0}'")]
    NoMatch(String),
    #[error("'{query}' matches {} places", .candidates.len())]
    Ambiguous {
        query: String,
        candidates: Vec<LocationCandidate>,
    },
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InputInvalid(_) => StatusCode::BAD_REQUEST,
            Self::NoMatch(_) => StatusCode::NOT_FOUND,
            Self::Ambiguous { .. } => StatusCode::MULTIPLE_CHOICES,
            Self::UpstreamUnavailable(_) | Self::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LocationError> for SearchError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::InputTooShort => Self::InputInvalid(e.to_string()),
            LocationError::NotFound(q) => Self::NoMatch(q),
            LocationError::Network(m) => Self::UpstreamUnavailable(m),
            LocationError::InvalidResponse(m) => Self::MalformedResponse(m),
        }
    }
}

impl From<ForecastError> for SearchError {
    fn from(e: ForecastError) -> Self {
        match e {
            ForecastError::Network(m) => Self::UpstreamUnavailable(m),
            ForecastError::Malformed { .. } => Self::MalformedResponse(e.to_string()),
        }
    }
}

impl From<TimezoneError> for SearchError {
    fn from(e: TimezoneError) -> Self {
        match e {
            TimezoneError::InvalidResponse(m) => Self::MalformedResponse(m),
            other => Self::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for SearchError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for SearchError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

// ─── Response bodies ────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}

#[derive(Serialize)]
pub struct AmbiguousBody<'a> {
    pub multiple: bool,
    pub query: &'a str,
    pub options: &'a [LocationCandidate],
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        code: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Ambiguous { query, candidates } => {
                let body = AmbiguousBody {
                    multiple: true,
                    query,
                    options: candidates,
                };
                (status, Json(body)).into_response()
            }
            Self::UpstreamUnavailable(detail) | Self::MalformedResponse(detail) => {
                tracing::warn!(%detail, "upstream failure");
                error_response(status, UPSTREAM_MESSAGE)
            }
            Self::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                error_response(status, "Internal server error")
            }
            _ => error_response(status, self.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingFields => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "auth failure");
            return error_response(status, "Internal server error");
        }
        error_response(status, self.to_string())
    }
}
