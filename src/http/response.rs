//! Response error mapping.
//!
//! # Responsibilities
//! - Map dispatch failures to HTTP status codes
//! - Mark relay failures so callers can tell them from an origin's own 502
//!
//! # Design Decisions
//! - A fixture deleted between resolution and read is a 404, not a 500
//! - Internal errors never leak details beyond a short message

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Set on 502 responses produced by the relay itself.
pub const RELAY_ERROR_HEADER: &str = "x-mockroute-relay-error";

/// Failures while serving a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no mock matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("fixture `{0}` vanished before it could be read")]
    FixtureVanished(String),

    #[error("proxy fallback unreachable: {0}")]
    ProxyUnreachable(String),

    #[error("request body rejected: {0}")]
    BodyRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } | DispatchError::FixtureVanished(_) => {
                StatusCode::NOT_FOUND
            }
            DispatchError::ProxyUnreachable(_) => StatusCode::BAD_GATEWAY,
            DispatchError::BodyRejected(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = match &self {
            DispatchError::Internal(_) => (status, "Internal Server Error").into_response(),
            other => (status, other.to_string()).into_response(),
        };
        if matches!(self, DispatchError::ProxyUnreachable(_)) {
            response
                .headers_mut()
                .insert(RELAY_ERROR_HEADER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Requests rejected before routing.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("URI too long")]
    UriTooLong,

    #[error("control characters in URL")]
    ControlCharsInUrl,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = match self {
            GuardError::UriTooLong => StatusCode::URI_TOO_LONG,
            GuardError::ControlCharsInUrl => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}
