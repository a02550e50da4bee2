//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared state: registries, cookie jar, runtime settings
//! - Create the Axum router: control API under `/mockroute/`, mocks as fallback
//! - Wire up middleware (request ID, tracing, timeout, URI guard, CORS)
//! - Start the filesystem watcher and its event loop
//! - Serve until shutdown

use arc_swap::ArcSwap;
use axum::{
    http::{HeaderName, HeaderValue},
    middleware, Router,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::{MockConfig, RuntimeSettings};
use crate::http::cookies::CookieJar;
use crate::http::dispatch::mock_handler;
use crate::http::middleware::cors_middleware;
use crate::http::plugins::PluginChain;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, uri_guard};
use crate::lifecycle::{signals::shutdown_signal, Shutdown};
use crate::mocks::BrokerRegistry;
use crate::observability::metrics;
use crate::proxy::{Collector, ProxyRelay, RelayError};
use crate::statics::StaticRegistry;
use crate::watcher::{apply_events, FsEvent, MockWatcher, SyncVersion, WatchTargets};

/// Path prefix of the control API.
pub const CONTROL_PREFIX: &str = "/mockroute";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("mocks directory `{path}` is not readable: {source}")]
    MocksDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("static directory `{path}` is not readable: {source}")]
    StaticDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid extra header `{0}`")]
    Header(String),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MockConfig>,
    pub registry: Arc<RwLock<BrokerRegistry>>,
    pub statics: Arc<RwLock<StaticRegistry>>,
    pub cookies: Arc<RwLock<CookieJar>>,
    pub settings: Arc<ArcSwap<RuntimeSettings>>,
    pub sync: SyncVersion,
    pub plugins: PluginChain,
    pub relay: ProxyRelay,
    pub collector: Collector,
    pub watcher: Arc<MockWatcher>,
    pub extra_headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl AppState {
    /// Targets the watcher event loop mutates.
    pub fn watch_targets(&self) -> WatchTargets {
        WatchTargets {
            registry: self.registry.clone(),
            statics: self.statics.clone(),
            sync: self.sync.clone(),
        }
    }

    /// Swap in new runtime settings derived from the current ones.
    pub fn update_settings(&self, f: impl Fn(&mut RuntimeSettings)) {
        self.settings.rcu(|current| {
            let mut next = RuntimeSettings::clone(current);
            f(&mut next);
            next
        });
    }
}

/// HTTP server for the mock server.
pub struct HttpServer {
    router: Router,
    state: AppState,
    events: Option<mpsc::UnboundedReceiver<FsEvent>>,
}

impl HttpServer {
    /// Create a server with the transforms named in the config.
    pub fn new(config: MockConfig) -> Result<Self, StartupError> {
        let plugins = PluginChain::from_config(&config)?;
        Self::with_plugins(config, plugins)
    }

    /// Create a server with a caller-built plugin chain.
    pub fn with_plugins(config: MockConfig, plugins: PluginChain) -> Result<Self, StartupError> {
        let mocks_dir = config
            .mocks_dir
            .canonicalize()
            .map_err(|source| StartupError::MocksDir {
                path: config.mocks_dir.clone(),
                source,
            })?;
        let static_dir = config
            .static_dir
            .as_ref()
            .map(|dir| {
                dir.canonicalize().map_err(|source| StartupError::StaticDir {
                    path: dir.clone(),
                    source,
                })
            })
            .transpose()?;

        let ignore = if config.ignore.is_empty() {
            None
        } else {
            Some(Regex::new(&config.ignore)?)
        };

        let mut registry = BrokerRegistry::new(&mocks_dir, ignore.clone());
        registry.init();
        metrics::record_registry_size(registry.broker_count());

        let mut statics = StaticRegistry::new(static_dir.clone(), ignore);
        statics.init();

        let extra_headers = config
            .extra_headers
            .iter()
            .map(|(name, value)| {
                let name = HeaderName::try_from(name.as_str())
                    .map_err(|_| StartupError::Header(name.clone()))?;
                let value = HeaderValue::try_from(value.as_str())
                    .map_err(|_| StartupError::Header(name.to_string()))?;
                Ok::<_, StartupError>((name, value))
            })
            .collect::<Result<Vec<_>, StartupError>>()?;

        let (watcher, events) = MockWatcher::new(&mocks_dir, static_dir.as_deref());
        let relay = ProxyRelay::new(Duration::from_secs(config.limits.request_timeout_secs))?;

        let state = AppState {
            registry: Arc::new(RwLock::new(registry)),
            statics: Arc::new(RwLock::new(statics)),
            cookies: Arc::new(RwLock::new(CookieJar::new(config.cookies.clone()))),
            settings: Arc::new(ArcSwap::from_pointee(RuntimeSettings::from_config(&config))),
            sync: SyncVersion::new(),
            plugins,
            relay,
            collector: Collector::new(&mocks_dir, config.format_collected_json),
            watcher: Arc::new(watcher),
            extra_headers: Arc::new(extra_headers),
            config: Arc::new(config),
        };

        // events queue up until `run` spawns their consumer
        if state.config.watch {
            if let Err(e) = state.watcher.start() {
                tracing::error!(error = %e, "Failed to start mock watcher");
            }
        }

        let router = Self::build_router(&state);
        Ok(Self {
            router,
            state,
            events: Some(events),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        let limits = &state.config.limits;
        Router::new()
            .nest(CONTROL_PREFIX, admin::control_router())
            .fallback(mock_handler)
            .layer(middleware::from_fn_with_state(state.clone(), cors_middleware))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(limits.max_uri_length, uri_guard))
            .layer(TimeoutLayer::new(Duration::from_secs(limits.request_timeout_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn mocks_dir(&self) -> &Path {
        self.state.collector.mocks_dir()
    }

    /// Run the server until `shutdown` fires or a signal arrives.
    pub async fn run(mut self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(events) = self.events.take() {
            let targets = self.state.watch_targets();
            tokio::spawn(apply_events(events, targets, shutdown.subscribe()));
        }

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown.subscribe()))
            .await;

        self.state.watcher.stop();
        shutdown.trigger();
        tracing::info!("HTTP server stopped");
        result
    }
}
