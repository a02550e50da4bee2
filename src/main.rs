//! mockroute: local mock HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                    MOCKROUTE                      │
//!                      │                                                   │
//!     Client Request   │  ┌────────┐    ┌──────────┐    ┌──────────────┐  │
//!     ─────────────────┼─▶│  http  │───▶│ dispatch │───▶│   registry   │  │
//!                      │  │ server │    │          │    │  + brokers   │  │
//!                      │  └───┬────┘    └────┬─────┘    └──────▲───────┘  │
//!                      │      │              │                 │          │
//!                      │      ▼              ▼                 │          │
//!     Dashboard / CLI  │  ┌────────┐    ┌──────────┐    ┌──────┴───────┐  │
//!     ─────────────────┼─▶│ admin  │    │  proxy   │    │   watcher    │◀─┼── mocks dir
//!                      │  │control │    │  relay   │───▶│ + sync ver.  │  │
//!                      │  └────────┘    └────┬─────┘    └──────────────┘  │
//!                      │                     │ collect                    │
//!                      └─────────────────────┼────────────────────────────┘
//!                                            ▼
//!                                     Fallback origin
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use mockroute::config::{load_config, validation::validate_config, MockConfig};
use mockroute::observability::{logging, metrics};
use mockroute::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "mockroute")]
#[command(about = "Local HTTP server serving filename-routed mock fixtures", long_about = None)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of mock fixtures (overrides the config file)
    #[arg(short, long)]
    mocks_dir: Option<PathBuf>,

    /// Directory of static assets (overrides the config file)
    #[arg(short, long)]
    static_dir: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Do not watch the mocks directory for changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => MockConfig::default(),
    };
    if let Some(dir) = args.mocks_dir {
        config.mocks_dir = dir;
    }
    if let Some(dir) = args.static_dir {
        config.static_dir = Some(dir);
    }
    if let Some(host) = args.host {
        config.listener.host = host;
    }
    if let Some(port) = args.port {
        config.listener.port = port;
    }
    if args.no_watch {
        config.watch = false;
    }
    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mockroute starting");

    tracing::info!(
        mocks_dir = %config.mocks_dir.display(),
        static_dir = ?config.static_dir,
        proxy_fallback = %config.proxy_fallback,
        watch = config.watch,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener, Shutdown::new()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
