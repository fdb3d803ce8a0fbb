//! # ampiod: Ampio bridge daemon
//!
//! Composition root that wires the MQTT adapter to the bridge core.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize logging
//! - Connect to the broker (adapter)
//! - Construct the bridge, injecting the publisher via its port trait
//! - Run until the inbound stream ends or SIGINT is received
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use tracing_subscriber::EnvFilter;

use ampio_app::Bridge;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let (publisher, inbound, event_loop) =
        ampio_adapter_mqtt::connect(&config.mqtt, &config.bridge.prefix);

    let bridge = Bridge::new(config.bridge, publisher.clone());
    let handle = bridge.handle();
    let mut events = handle.events();
    let logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(address = %event.address(), ?event, "bridge event");
        }
    });

    tracing::info!("ampiod started");
    bridge.run(inbound, shutdown_signal()).await;

    if let Err(err) = publisher.disconnect().await {
        tracing::debug!(%err, "broker connection already closed");
    }
    event_loop.abort();
    logger.abort();
    tracing::info!(devices = handle.list_devices().len(), "ampiod stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
