//! Proxy relay to the fallback origin.
//!
//! # Responsibilities
//! - Forward method, headers, and body to `origin + path + query`
//! - Copy the origin's status, headers, and body back unchanged
//! - Keep every `Set-Cookie` value
//!
//! # Design Decisions
//! - Hop-by-hop headers are dropped in both directions
//! - `Content-Length` is recomputed from the buffered body
//! - Redirects are returned to the client, never followed here

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-authenticate",
];

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to build relay client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid relay target `{0}`")]
    InvalidTarget(String),

    #[error("request to {target} failed: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A request captured for relaying.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    /// Path plus query exactly as received, e.g. `/api/user?id=1`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The origin's answer, fully buffered.
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RelayedResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// HTTP client forwarding to the proxy fallback.
#[derive(Debug, Clone)]
pub struct ProxyRelay {
    client: reqwest::Client,
}

impl ProxyRelay {
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(RelayError::Client)?;
        Ok(Self { client })
    }

    /// Join the origin and the request's path. An origin may carry a path prefix.
    pub fn target(origin: &Url, path_and_query: &str) -> Result<Url, RelayError> {
        let joined = format!("{}{}", origin.as_str().trim_end_matches('/'), path_and_query);
        Url::parse(&joined).map_err(|_| RelayError::InvalidTarget(joined))
    }

    pub async fn forward(
        &self,
        origin: &Url,
        request: RelayRequest,
    ) -> Result<RelayedResponse, RelayError> {
        let target = Self::target(origin, &request.path_and_query)?;

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let mut builder = self.client.request(request.method.clone(), target.clone()).headers(headers);
        if request.method != Method::GET && request.method != Method::HEAD {
            builder = builder.body(request.body);
        }

        let unreachable = |source: reqwest::Error| RelayError::Unreachable {
            target: target.to_string(),
            source,
        };
        let response = builder.send().await.map_err(unreachable)?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let body = response.bytes().await.map_err(unreachable)?;

        tracing::debug!(url = %target, status = %status, bytes = body.len(), "Relayed request");
        Ok(RelayedResponse {
            status,
            headers,
            body,
        })
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}
