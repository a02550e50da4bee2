//! Control API.
//!
//! # Responsibilities
//! - Report registry, static, cookie, and settings state to the dashboard
//! - Long-poll the sync version
//! - Mutate brokers (select, synthetic 500, proxied, delay, bulk by comment)
//! - Mutate runtime settings (fallback, delay, jitter, collect, CORS, watcher)
//!
//! # Design Decisions
//! - Mounted under `/mockroute/` so it never shadows a mocked route
//! - Bodies are bounded JSON; bad input is a 422, a length mismatch a 400
//! - Control changes do not bump the sync version; only `reset` and the watcher do

pub mod body;
pub mod error;
pub mod handlers;

use axum::{
    routing::{get, patch},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub use error::ControlError;

/// Control routes, relative to the control prefix.
pub fn control_router() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/sync-version", get(get_sync_version))
        .route("/select", patch(select_mock))
        .route("/toggle500", patch(toggle_500))
        .route("/proxied", patch(set_route_proxied))
        .route("/delay", patch(set_route_delay))
        .route("/bulk-select-by-comment", patch(bulk_select_by_comment))
        .route("/reset", patch(reset))
        .route("/cookies", patch(select_cookie))
        .route("/fallback", patch(set_fallback))
        .route("/collect-proxied", patch(set_collect_proxied))
        .route("/global-delay", patch(set_global_delay))
        .route("/global-delay-jitter", patch(set_global_delay_jitter))
        .route("/cors", patch(set_cors))
        .route("/watch-mocks", patch(set_watch_mocks))
        .route("/static-delay", patch(set_static_delay))
        .route("/static-404", patch(set_static_404))
}
