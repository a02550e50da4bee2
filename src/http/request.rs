//! Request validation and identification.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it on the response
//! - Reject URIs that are too long (414) before routing
//! - Reject URIs carrying control characters, raw or percent-encoded (400)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Checks run before routing so no handler sees a malformed path

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::GuardError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns an `x-request-id` to requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Reads the request ID set by [`set_request_id_layer`].
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Middleware rejecting over-long or control-character URIs.
pub async fn uri_guard(
    State(max_uri_length): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Err(e) = check_uri(request.uri().to_string().as_str(), max_uri_length) {
        tracing::warn!(request_id = %request_id(&request), error = %e, "Rejected request URI");
        return e.into_response();
    }
    next.run(request).await
}

pub fn check_uri(uri: &str, max_uri_length: usize) -> Result<(), GuardError> {
    if uri.len() > max_uri_length {
        return Err(GuardError::UriTooLong);
    }
    let decoded = percent_decode_str(uri).decode_utf8_lossy();
    if decoded.chars().any(char::is_control) {
        return Err(GuardError::ControlCharsInUrl);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_uri() {
        assert!(check_uri("/api/user?id=1", 64).is_ok());
        assert!(matches!(check_uri(&"/a".repeat(40), 64), Err(GuardError::UriTooLong)));
        assert!(matches!(check_uri("/api/%00", 64), Err(GuardError::ControlCharsInUrl)));
        assert!(matches!(check_uri("/api/%0Ax", 64), Err(GuardError::ControlCharsInUrl)));
    }
}
