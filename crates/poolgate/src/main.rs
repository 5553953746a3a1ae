//! Poolgate - dynamically configurable reverse proxy and load balancer

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LogFormat};
use poolgate_api::routes::metrics::describe_metrics;
use poolgate_api::{AppState, create_admin_router, create_proxy_router};
use poolgate_core::{Registry, apply_services};
use poolgate_proxy::Forwarder;

/// Poolgate - reverse proxy with runtime-managed services, pools and nodes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address for both listeners
    #[arg(long, env = "POOLGATE_BIND")]
    bind: Option<String>,

    /// Data-plane port
    #[arg(long, env = "POOLGATE_PROXY_PORT")]
    proxy_port: Option<u16>,

    /// Control-plane port
    #[arg(long, env = "POOLGATE_ADMIN_PORT")]
    admin_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging.level, config.logging.format);

    info!("Starting Poolgate v{}", env!("CARGO_PKG_VERSION"));

    // Install the Prometheus recorder before any counter is touched
    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        describe_metrics();
        Some(Arc::new(handle))
    } else {
        None
    };

    // Seed the registry
    let registry = Registry::new();
    apply_services(&registry, &config.services).context("Failed to register configured services")?;

    // Initialize the forwarding client
    let forwarder = Arc::new(
        Forwarder::new(config.forwarding.forwarder_config())
            .context("Failed to build forwarding client")?,
    );

    // Create application state and routers
    let state = AppState::new(registry, forwarder);
    let proxy_app = create_proxy_router(state.clone());
    let admin_app = create_admin_router(state, metrics_handle);

    // Determine bind addresses
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let proxy_port = args.proxy_port.unwrap_or(config.server.proxy_port);
    let admin_port = args.admin_port.unwrap_or(config.server.admin_port);
    let proxy_addr: SocketAddr = format!("{}:{}", bind_addr, proxy_port)
        .parse()
        .with_context(|| format!("Invalid proxy address {}:{}", bind_addr, proxy_port))?;
    let admin_addr: SocketAddr = format!("{}:{}", bind_addr, admin_port)
        .parse()
        .with_context(|| format!("Invalid admin address {}:{}", bind_addr, admin_port))?;

    let proxy_listener = TcpListener::bind(proxy_addr)
        .await
        .with_context(|| format!("Failed to bind data plane on {}", proxy_addr))?;
    let admin_listener = TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("Failed to bind control plane on {}", admin_addr))?;

    info!("Data plane listening on {}", proxy_addr);
    info!("Control plane listening on {}", admin_addr);

    // Start both servers; the data plane needs peer addresses for X-Forwarded-For
    let proxy_server = axum::serve(
        proxy_listener,
        proxy_app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_app).with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async { proxy_server.await.context("Data plane server failed") },
        async { admin_server.await.context("Control plane server failed") },
    )?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
