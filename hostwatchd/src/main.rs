mod api;
mod cluster;
mod config;
mod controller;
mod discovery;
mod host;
mod namer;
mod service;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use anyhow::{Context, Result};
use crate::config::{Config, DiscoveryMode};
use crate::controller::{Controller, ControllerHandle};
use crate::discovery::{Discovery, FixtureDiscovery, MdnsDiscovery};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hostwatchd=info"))
        )
        .init();

    tracing::info!("Starting hostwatchd");

    // Config file is optional
    let config = match std::env::args().nth(1) {
        Some(config_path) => {
            let config = Config::load(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path))?;
            tracing::info!("Loaded config from {}", config_path);
            config
        }
        None => {
            tracing::info!("No config file given, using defaults");
            Config::default()
        }
    };

    let api_port = config.api.port();
    let (batch_tx, batch_rx) = mpsc::channel(64);

    // The mDNS daemon is needed for browsing and for advertising ourselves
    let mdns_daemon = if config.discovery.mode == DiscoveryMode::Mdns || config.advertise.enabled {
        Some(create_daemon(config.discovery.interface.as_deref())?)
    } else {
        None
    };

    let backend: Box<dyn Discovery> = match (&config.discovery.mode, &mdns_daemon) {
        (DiscoveryMode::Mdns, Some(daemon)) => Box::new(MdnsDiscovery::new(
            daemon.clone(),
            config.discovery.browse_types(),
            batch_tx,
        )),
        _ => {
            tracing::info!("Using demo discovery fixture");
            Box::new(FixtureDiscovery::demo(batch_tx))
        }
    };

    let service_info: Option<ServiceInfo> = match (&mdns_daemon, config.advertise.enabled) {
        (Some(daemon), true) => Some(discovery::advertise::register_self(daemon, &config.advertise, api_port)?),
        _ => None,
    };

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn the aggregator task
    let controller = Controller::new(backend, config.discovery.grace_period());
    let (handle, aggregator_handle) = ControllerHandle::spawn(
        controller,
        batch_rx,
        config.discovery.restart_delay(),
        cancel.clone(),
    );
    handle.start().await.context("Failed to start discovery")?;

    // Build API router
    let app = api::routes::router(api::routes::AppState {
        controller: handle.clone(),
    });

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(aggregator_handle, server_handle);

    if let Some(daemon) = mdns_daemon {
        // Unregister mDNS service
        if let Some(info) = &service_info {
            if let Err(e) = discovery::advertise::unregister_self(&daemon, info) {
                tracing::error!("Failed to unregister mDNS service: {}", e);
            }
        }

        // Shutdown mDNS daemon
        if let Err(e) = daemon.shutdown() {
            tracing::error!("Failed to shutdown mDNS daemon: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// mDNS daemon, optionally bound to a single interface
fn create_daemon(interface: Option<&str>) -> Result<ServiceDaemon> {
    let daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;

    if let Some(interface) = interface {
        daemon
            .disable_interface(mdns_sd::IfKind::All)
            .context("Failed to disable default interfaces")?;
        daemon
            .enable_interface(interface)
            .with_context(|| format!("Failed to enable interface {}", interface))?;
    }

    Ok(daemon)
}
