use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::admin::body::ControlBody;
use crate::admin::error::ControlError;
use crate::config::validation::{
    check_fallback, delay_fits_timeout, is_valid_jitter, MAX_DELAY_MS,
};
use crate::config::RuntimeSettings;
use crate::http::cookies::CookieEntry;
use crate::http::server::AppState;
use crate::mocks::{MockBroker, RegistrySnapshot};
use crate::statics::StaticSnapshot;

/// Request header carrying the client's last known sync version.
pub const SYNC_VERSION_HEADER: &str = "sync-version";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub cookies: Vec<CookieEntry>,
    pub comments: Vec<String>,
    pub brokers: RegistrySnapshot,
    pub static_brokers: BTreeMap<String, StaticSnapshot>,
    #[serde(flatten)]
    pub settings: RuntimeSettings,
    pub watch_mocks: bool,
}

/// Identifies a broker, plus an optional flag.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFlag {
    pub method: String,
    pub url_mask: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticFlag {
    pub route: String,
    #[serde(default)]
    pub value: Value,
}

pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    let (brokers, comments) = {
        let registry = state.registry.read().await;
        (registry.snapshot(), registry.extract_all_comments())
    };
    let static_brokers = state.statics.read().await.snapshot();
    let cookies = state.cookies.read().await.list();

    Json(StateResponse {
        cookies,
        comments,
        brokers,
        static_brokers,
        settings: RuntimeSettings::clone(&state.settings.load()),
        watch_mocks: state.watcher.is_running(),
    })
}

/// Long poll: answers at once when the client's version is stale,
/// otherwise on the next change or after the poll timeout.
pub async fn get_sync_version(State(state): State<AppState>, headers: HeaderMap) -> Json<u64> {
    let known = headers
        .get(SYNC_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let Some(known) = known else {
        return Json(state.sync.current());
    };
    let timeout = Duration::from_millis(state.config.limits.long_poll_timeout_ms);
    Json(state.sync.wait_for_change(known, timeout).await)
}

pub async fn select_mock(
    State(state): State<AppState>,
    ControlBody(file): ControlBody<String>,
) -> Result<StatusCode, ControlError> {
    state.registry.write().await.select_file(&file)?;
    tracing::info!(file = %file, "Mock selected");
    Ok(StatusCode::OK)
}

pub async fn toggle_500(
    State(state): State<AppState>,
    ControlBody(route): ControlBody<RouteFlag>,
) -> Result<StatusCode, ControlError> {
    with_broker(&state, &route, |broker| broker.toggle_synthetic_error()).await?;
    Ok(StatusCode::OK)
}

pub async fn set_route_proxied(
    State(state): State<AppState>,
    ControlBody(route): ControlBody<RouteFlag>,
) -> Result<StatusCode, ControlError> {
    let proxied = expect_bool(&route.value, "value")?;
    with_broker(&state, &route, |broker| broker.set_proxied(proxied)).await?;
    Ok(StatusCode::OK)
}

pub async fn set_route_delay(
    State(state): State<AppState>,
    ControlBody(route): ControlBody<RouteFlag>,
) -> Result<StatusCode, ControlError> {
    let delayed = expect_bool(&route.value, "value")?;
    with_broker(&state, &route, |broker| broker.set_delayed(delayed)).await?;
    Ok(StatusCode::OK)
}

pub async fn bulk_select_by_comment(
    State(state): State<AppState>,
    ControlBody(comment): ControlBody<String>,
) -> StatusCode {
    state.registry.write().await.set_mocks_matching_comment(&comment);
    tracing::info!(comment = %comment, "Bulk selected by comment");
    StatusCode::OK
}

pub async fn reset(State(state): State<AppState>) -> StatusCode {
    let brokers = state.registry.write().await.init();
    state.statics.write().await.init();
    state.cookies.write().await.reset();
    state.sync.increment();
    tracing::info!(brokers, "Registry reset");
    StatusCode::OK
}

pub async fn select_cookie(
    State(state): State<AppState>,
    ControlBody(label): ControlBody<String>,
) -> Result<StatusCode, ControlError> {
    state.cookies.write().await.select(&label)?;
    Ok(StatusCode::OK)
}

pub async fn set_fallback(
    State(state): State<AppState>,
    ControlBody(fallback): ControlBody<String>,
) -> Result<StatusCode, ControlError> {
    let url = check_fallback(&fallback).map_err(ControlError::InvalidUrl)?;
    tracing::info!(fallback = %fallback, "Proxy fallback changed");
    state.update_settings(|s| s.proxy_fallback = url.clone());
    Ok(StatusCode::OK)
}

pub async fn set_collect_proxied(
    State(state): State<AppState>,
    ControlBody(value): ControlBody<Value>,
) -> Result<StatusCode, ControlError> {
    let collect = expect_bool(&value, "collectProxied")?;
    state.update_settings(|s| s.collect_proxied = collect);
    Ok(StatusCode::OK)
}

pub async fn set_global_delay(
    State(state): State<AppState>,
    ControlBody(value): ControlBody<Value>,
) -> Result<StatusCode, ControlError> {
    let delay_ms = value
        .as_u64()
        .filter(|ms| *ms <= MAX_DELAY_MS)
        .ok_or_else(|| {
            ControlError::InvalidValue(format!("delay must be an integer in 0..={MAX_DELAY_MS}"))
        })?;
    check_delay_budget(&state, delay_ms, state.settings.load().delay_jitter)?;
    state.update_settings(|s| s.delay_ms = delay_ms);
    Ok(StatusCode::OK)
}

pub async fn set_global_delay_jitter(
    State(state): State<AppState>,
    ControlBody(value): ControlBody<Value>,
) -> Result<StatusCode, ControlError> {
    let jitter = value
        .as_f64()
        .filter(|j| is_valid_jitter(*j))
        .ok_or_else(|| ControlError::InvalidValue("jitter must be a number in 0..=3".into()))?;
    check_delay_budget(&state, state.settings.load().delay_ms, jitter)?;
    state.update_settings(|s| s.delay_jitter = jitter);
    Ok(StatusCode::OK)
}

/// Delayed responses must complete before the request timeout cuts them off.
fn check_delay_budget(state: &AppState, delay_ms: u64, jitter: f64) -> Result<(), ControlError> {
    let timeout_secs = state.config.limits.request_timeout_secs;
    if delay_fits_timeout(delay_ms, jitter, timeout_secs) {
        Ok(())
    } else {
        Err(ControlError::InvalidValue(format!(
            "delay of {delay_ms}ms with jitter {jitter} exceeds the {timeout_secs}s request timeout"
        )))
    }
}

pub async fn set_cors(
    State(state): State<AppState>,
    ControlBody(value): ControlBody<Value>,
) -> Result<StatusCode, ControlError> {
    let allowed = expect_bool(&value, "corsAllowed")?;
    state.update_settings(|s| s.cors_allowed = allowed);
    Ok(StatusCode::OK)
}

pub async fn set_watch_mocks(
    State(state): State<AppState>,
    ControlBody(value): ControlBody<Value>,
) -> Result<StatusCode, ControlError> {
    if expect_bool(&value, "watchMocks")? {
        let was_running = state.watcher.is_running();
        state
            .watcher
            .start()
            .map_err(|e| ControlError::Watcher(e.to_string()))?;
        if !was_running {
            // catch up on whatever changed while nobody was watching
            let brokers = state.registry.write().await.init();
            state.statics.write().await.init();
            state.sync.increment();
            tracing::info!(brokers, "Registry rescanned after watcher restart");
        }
    } else {
        state.watcher.stop();
    }
    Ok(StatusCode::OK)
}

pub async fn set_static_delay(
    State(state): State<AppState>,
    ControlBody(flag): ControlBody<StaticFlag>,
) -> Result<StatusCode, ControlError> {
    let delayed = expect_bool(&flag.value, "value")?;
    let mut statics = state.statics.write().await;
    let broker = statics
        .by_route_mut(&flag.route)
        .ok_or_else(|| ControlError::StaticRouteNotFound(flag.route.clone()))?;
    broker.delayed = delayed;
    Ok(StatusCode::OK)
}

pub async fn set_static_404(
    State(state): State<AppState>,
    ControlBody(flag): ControlBody<StaticFlag>,
) -> Result<StatusCode, ControlError> {
    let not_found = expect_bool(&flag.value, "value")?;
    let mut statics = state.statics.write().await;
    let broker = statics
        .by_route_mut(&flag.route)
        .ok_or_else(|| ControlError::StaticRouteNotFound(flag.route.clone()))?;
    broker.not_found = not_found;
    Ok(StatusCode::OK)
}

async fn with_broker(
    state: &AppState,
    route: &RouteFlag,
    f: impl FnOnce(&mut MockBroker),
) -> Result<(), ControlError> {
    let mut registry = state.registry.write().await;
    let broker = registry
        .broker_by_route_mut(&route.method, &route.url_mask)
        .ok_or_else(|| ControlError::RouteNotFound {
            method: route.method.clone(),
            url_mask: route.url_mask.clone(),
        })?;
    f(broker);
    tracing::debug!(method = %route.method, url_mask = %route.url_mask, "Broker updated");
    Ok(())
}

fn expect_bool(value: &Value, field: &'static str) -> Result<bool, ControlError> {
    value.as_bool().ok_or(ControlError::ExpectedBoolean(field))
}
