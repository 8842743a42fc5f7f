mod backend;
mod config;
mod device;
mod error;
mod net;
mod registry;
mod ssdp;

use std::sync::Arc;
use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use shared::types::DeviceIdentity;
use crate::backend::Plug;
use crate::config::Config;
use crate::device::{DeviceEndpoint, EndpointSettings};
use crate::registry::Registry;
use crate::ssdp::{DiscoveryResponder, DiscoverySettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wemo_emulatord=info"))
        )
        .init();

    tracing::info!("Starting wemo-emulatord");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/wemo-emulator/emulator.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {} ({} devices)", config_path, config.devices.len());

    let ip = net::resolve_ip(&config.emulator.ip_address)
        .await
        .context("Failed to determine the address to advertise")?;

    // Bind one endpoint per device. A device whose port is taken is skipped
    // and never advertised.
    let settings = EndpointSettings::from(&config.emulator);
    let mut registry = Registry::new();
    let mut endpoints = Vec::with_capacity(config.devices.len());

    for device in &config.devices {
        let plug = Plug::from_config(device, config.emulator.action_timeout())
            .with_context(|| format!("Failed to set up device '{}'", device.name))?;
        let identity = DeviceIdentity::new(plug.name(), ip, plug.port());
        let span = tracing::info_span!("device", name = %plug.name(), port = plug.port());

        match DeviceEndpoint::bind(identity.clone(), plug, settings, span).await {
            Ok(endpoint) => {
                registry.register(identity)?;
                endpoints.push(endpoint);
            }
            Err(e) => tracing::error!("Skipping device '{}': {}", device.name, e),
        }
    }

    if registry.is_empty() {
        bail!("No device endpoint could be started");
    }
    tracing::info!("{} of {} devices ready", registry.len(), config.devices.len());
    for identity in registry.identities() {
        tracing::info!(
            "Advertising '{}' as {} at {}:{}",
            identity.name(),
            identity.udn(),
            identity.ip(),
            identity.port()
        );
    }

    // Discovery is shared by all devices, so failing to bind it is fatal
    let registry = Arc::new(registry);
    let responder = DiscoveryResponder::bind(
        DiscoverySettings::from(&config.discovery),
        registry.clone(),
        tracing::info_span!("ssdp"),
    )
    .context("Failed to start the discovery responder")?;

    // Create cancellation token and tracker for graceful shutdown
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    for endpoint in endpoints {
        tracker.spawn(endpoint.run(cancel.clone(), tracker.clone()));
    }
    tracker.spawn(responder.run(cancel.clone(), tracker.clone()));

    // Wait for shutdown signal
    shutdown_signal().await?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for listeners, connections and scheduled replies to finish
    tracker.close();
    tracker.wait().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())
        .context("Failed to listen for SIGTERM")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c"),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")
}
