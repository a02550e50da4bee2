//! Request dispatch: static files, mocks, proxy fallback.
//!
//! # Data Flow
//! ```text
//! Request
//!     → static route? (GET/HEAD only)  → file, or 404 when flagged
//!     → resolve broker (HEAD falls back to GET)
//!     → proxied broker, or no broker and a fallback set → relay
//!     → no broker → 404
//!     → synthetic error → 500, empty body
//!     → plugin chain → body + Content-Type
//!     → delay, then respond
//! ```
//!
//! # Design Decisions
//! - Everything needed from a broker is copied out under the read lock,
//!   so no lock is held across file reads, relays, or delays
//! - The delay is applied after the body is ready and never blocks other requests

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use url::Url;

use crate::http::delay::route_delay;
use crate::http::plugins::{FixtureRequest, PluginError};
use crate::http::request::request_id;
use crate::http::response::DispatchError;
use crate::http::server::AppState;
use crate::mocks::{BrokerRegistry, Selection};
use crate::observability::metrics::{self, Source};
use crate::proxy::RelayRequest;

/// What to serve for a resolved mock, copied out of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MockPlan {
    /// `None` means the synthetic error.
    pub file: Option<String>,
    pub status: u16,
    pub delayed: bool,
    pub proxied: bool,
    pub params: HashMap<String, String>,
}

/// Resolve the broker for a request. `HEAD` uses the `GET` broker when it has none.
pub fn plan_for(registry: &BrokerRegistry, method: &str, path: &str) -> Option<MockPlan> {
    let broker = registry.resolve(method, path).or_else(|| {
        (method == Method::HEAD.as_str())
            .then(|| registry.resolve(Method::GET.as_str(), path))
            .flatten()
    })?;

    let (file, proxied) = match broker.selection() {
        Selection::File(file) => (Some(file.clone()), false),
        Selection::SyntheticError => (None, false),
        Selection::Proxied { file } => (Some(file.clone()), true),
    };
    Some(MockPlan {
        file,
        status: broker.status(),
        delayed: broker.is_delayed(),
        proxied,
        params: broker.matcher().params(path).unwrap_or_default(),
    })
}

/// Fallback handler serving every non-control request.
pub async fn mock_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(&request).to_string();

    let (response, source) = match dispatch(&state, request).await {
        Ok(served) => served,
        Err(e) => {
            match &e {
                DispatchError::Internal(_) => {
                    tracing::error!(request_id = %request_id, error = %e, "Dispatch failed")
                }
                DispatchError::ProxyUnreachable(_) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Relay failed")
                }
                _ => tracing::debug!(request_id = %request_id, error = %e, "Request not served"),
            }
            let source = match e {
                DispatchError::ProxyUnreachable(_) => Source::Proxy,
                _ => Source::None,
            };
            (e.into_response(), source)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), source, start);
    response
}

async fn dispatch(
    state: &AppState,
    request: Request<Body>,
) -> Result<(Response, Source), DispatchError> {
    let settings = state.settings.load_full();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if method == Method::GET || method == Method::HEAD {
        if let Some(response) = serve_static(state, &method, &path).await? {
            return Ok((response, Source::Static));
        }
    }

    let plan = {
        let registry = state.registry.read().await;
        plan_for(&registry, method.as_str(), &path)
    };

    if let Some(origin) = &settings.proxy_fallback {
        if plan.as_ref().is_none_or(|p| p.proxied) {
            let delayed = plan.as_ref().is_some_and(|p| p.delayed);
            let delay = route_delay(delayed, settings.delay_ms, settings.delay_jitter);
            let response = relay(state, origin, request, delay, settings.collect_proxied).await?;
            return Ok((response, Source::Proxy));
        }
    }

    let Some(plan) = plan else {
        return Err(DispatchError::RouteNotFound {
            method: method.to_string(),
            path,
        });
    };

    let delay = route_delay(plan.delayed, settings.delay_ms, settings.delay_jitter);
    let fixture_request = FixtureRequest {
        method: method.to_string(),
        path: path.clone(),
        query: query_map(request.uri().query()),
        params: plan.params.clone(),
    };
    let response = serve_mock(state, &method, plan, fixture_request, delay).await?;
    Ok((response, Source::Mock))
}

async fn serve_mock(
    state: &AppState,
    method: &Method,
    plan: MockPlan,
    fixture_request: FixtureRequest,
    delay: Duration,
) -> Result<Response, DispatchError> {
    let status = StatusCode::from_u16(plan.status)
        .map_err(|_| DispatchError::Internal(format!("invalid status {}", plan.status)))?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.cookies.read().await.current_value() {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.insert(header::SET_COOKIE, value);
        }
    }
    for (name, value) in state.extra_headers.iter() {
        headers.append(name.clone(), value.clone());
    }

    let body = match plan.file {
        None => Bytes::new(),
        Some(file) => {
            let path = state.registry.read().await.mocks_dir().join(&file);
            let transformed = state
                .plugins
                .apply(&file, path, fixture_request)
                .await
                .map_err(|e| match e {
                    PluginError::NotFound(_) => DispatchError::FixtureVanished(file.clone()),
                    other => DispatchError::Internal(other.to_string()),
                })?;
            if let Some(mime) = transformed.mime.and_then(|m| HeaderValue::from_str(&m).ok()) {
                headers.insert(header::CONTENT_TYPE, mime);
            }
            transformed.body
        }
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let body = if *method == Method::HEAD { Body::empty() } else { Body::from(body) };
    Ok((status, headers, body).into_response())
}

async fn serve_static(
    state: &AppState,
    method: &Method,
    path: &str,
) -> Result<Option<Response>, DispatchError> {
    let (file, absolute, delayed, not_found) = {
        let statics = state.statics.read().await;
        let Some(broker) = statics.resolve(path) else {
            return Ok(None);
        };
        let Some(absolute) = statics.absolute_path(&broker.file) else {
            return Ok(None);
        };
        (broker.file.clone(), absolute, broker.delayed, broker.not_found)
    };

    let settings = state.settings.load();
    let delay = route_delay(delayed, settings.delay_ms, settings.delay_jitter);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if not_found {
        return Ok(Some(StatusCode::NOT_FOUND.into_response()));
    }

    let contents = tokio::fs::read(&absolute).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DispatchError::FixtureVanished(file.clone()),
        _ => DispatchError::Internal(format!("reading {file}: {e}")),
    })?;

    let mut headers = HeaderMap::new();
    if let Some(mime) = state
        .plugins
        .mimes()
        .mime_for_path(&absolute)
        .and_then(|m| HeaderValue::from_str(&m).ok())
    {
        headers.insert(header::CONTENT_TYPE, mime);
    }
    let body = if *method == Method::HEAD { Body::empty() } else { Body::from(contents) };
    Ok(Some((StatusCode::OK, headers, body).into_response()))
}

async fn relay(
    state: &AppState,
    origin: &Url,
    request: Request<Body>,
    delay: Duration,
    collect: bool,
) -> Result<Response, DispatchError> {
    let (parts, body) = request.into_parts();
    let body = if parts.method == Method::GET || parts.method == Method::HEAD {
        Bytes::new()
    } else {
        axum::body::to_bytes(body, state.config.limits.proxy_body_bytes)
            .await
            .map_err(|e| DispatchError::BodyRejected(e.to_string()))?
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut headers = parts.headers;
    if collect {
        // collected fixtures are stored decoded
        headers.remove(header::ACCEPT_ENCODING);
    }

    let relayed = state
        .relay
        .forward(
            origin,
            RelayRequest {
                method: parts.method.clone(),
                path_and_query: path_and_query.clone(),
                headers,
                body,
            },
        )
        .await
        .map_err(|e| DispatchError::ProxyUnreachable(e.to_string()))?;

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if collect {
        let result = state
            .collector
            .collect(
                &path_and_query,
                parts.method.as_str(),
                relayed.status.as_u16(),
                relayed.content_type(),
                &relayed.body,
                state.plugins.mimes(),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, path = %path_and_query, "Failed to collect proxied response");
        }
    }

    let mut response = Response::new(Body::from(relayed.body));
    *response.status_mut() = relayed.status;
    *response.headers_mut() = relayed.headers;
    Ok(response)
}

fn query_map(query: Option<&str>) -> BTreeMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
