//! ROS Relay - Entry Point
//!
//! Starts the rosbridge connection, the subscription supervisor and the API
//! server with graceful shutdown support.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ros_relay::api::{ApiServer, AppState};
use ros_relay::bus::{BusClient, RosbridgeTransport};
use ros_relay::config::{Config, LogConfig};
use ros_relay::relay::RelayHub;
use ros_relay::services::{RequiredSubscription, SubscriptionSupervisor, CAMERA_CONSUMER};

/// Inbound bus messages queued between the socket reader and dispatch
const INBOUND_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> ros_relay::Result<()> {
    let config = Arc::new(Config::from_env()?);
    init_tracing(&config.log);

    info!("Starting ROS Relay");
    info!("Configuration loaded");

    // Owned components
    let (transport, worker) = RosbridgeTransport::new(config.bus.clone());
    let bus = Arc::new(BusClient::new(transport.clone()));
    let hub = Arc::new(RelayHub::new(&config.relay));
    let supervisor = Arc::new(SubscriptionSupervisor::new(
        bus.clone(),
        config.relay.supervisor_interval,
    ));

    // The camera feed is held for the whole process lifetime
    supervisor.require(RequiredSubscription::new(
        config.relay.camera_topic.clone(),
        config.relay.camera_message_type.clone(),
        CAMERA_CONSUMER,
        hub.camera_feed(),
    ));
    info!(
        topic = %config.relay.camera_topic,
        "Camera subscription registered"
    );

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    // Bus worker and dispatcher
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let worker_shutdown = shutdown_tx.subscribe();
    let worker_task = tokio::spawn(async move {
        worker.run(inbound_tx, worker_shutdown).await;
    });

    let dispatch_bus = bus.clone();
    let dispatch_task = tokio::spawn(async move {
        dispatch_bus.run_dispatch(inbound_rx).await;
    });

    // Subscription supervisor
    let supervisor_shutdown = shutdown_tx.subscribe();
    let supervisor_service = supervisor.clone();
    let supervisor_task = tokio::spawn(async move {
        supervisor_service.run(supervisor_shutdown).await;
    });

    // API server
    let api_server = ApiServer::new(AppState::new(
        config.clone(),
        bus.clone(),
        hub.clone(),
        supervisor.clone(),
    ));
    let api_shutdown = shutdown_tx.subscribe();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!(
        "Relay started - API: {}, rosbridge: {}",
        config.api_addr(),
        transport.url()
    );

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);

    // Dispatch ends once the worker drops its inbound sender
    let _ = tokio::join!(worker_task, supervisor_task, api_task, dispatch_task);

    info!("ROS Relay stopped");
    Ok(())
}

/// Initialize tracing from the log configuration
///
/// `RUST_LOG` takes precedence over `LOG_LEVEL`.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ros_relay={},tower_http=debug", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("pretty") {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
