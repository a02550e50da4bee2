//! CORS middleware.
//!
//! Toggled at runtime through the control API, so it reads the current
//! settings on every request instead of being baked into a layer.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::http::server::AppState;

pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.settings.load().cors_allowed {
        return next.run(request).await;
    }

    let cors = &state.config.cors;
    let Some(origin) = request
        .headers()
        .get(header::ORIGIN)
        .filter(|o| origin_allowed(cors, o))
        .cloned()
    else {
        return next.run(request).await;
    };

    let is_preflight = request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    if is_preflight {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        apply_origin(headers, cors, origin);
        if let Ok(methods) = HeaderValue::from_str(&cors.methods.join(", ")) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
        }
        let allow_headers = if cors.headers.is_empty() {
            // echo whatever the browser asked for
            request
                .headers()
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned()
        } else {
            HeaderValue::from_str(&cors.headers.join(", ")).ok()
        };
        if let Some(allow_headers) = allow_headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
        }
        if cors.max_age_secs > 0 {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(cors.max_age_secs));
        }
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    apply_origin(headers, cors, origin);
    if !cors.expose_headers.is_empty() {
        if let Ok(expose) = HeaderValue::from_str(&cors.expose_headers.join(", ")) {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose);
        }
    }
    response
}

fn origin_allowed(cors: &CorsConfig, origin: &HeaderValue) -> bool {
    cors.origins
        .iter()
        .any(|allowed| allowed == "*" || origin.as_bytes() == allowed.as_bytes())
}

/// The request origin is echoed rather than `*`, which browsers reject with credentials.
fn apply_origin(headers: &mut HeaderMap, cors: &CorsConfig, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.append(header::VARY, HeaderValue::from_static("origin"));
    if cors.credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_allowed() {
        let mut cors = CorsConfig::default();
        assert!(origin_allowed(&cors, &HeaderValue::from_static("http://a.test")));

        cors.origins = vec!["http://a.test".to_string()];
        assert!(origin_allowed(&cors, &HeaderValue::from_static("http://a.test")));
        assert!(!origin_allowed(&cors, &HeaderValue::from_static("http://b.test")));
    }
}
