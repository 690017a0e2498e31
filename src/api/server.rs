//! API server using Axum
//!
//! Serves the relay's REST, SSE and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::bus::BusClient;
use crate::config::Config;
use crate::containers::ContainerCli;
use crate::error::{RelayError, Result};
use crate::relay::{HealthAggregator, RelayHub};
use crate::services::SubscriptionSupervisor;

use super::middleware::cors_layer;
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub bus: Arc<BusClient>,
    pub hub: Arc<RelayHub>,
    pub supervisor: Arc<SubscriptionSupervisor>,
    pub health: HealthAggregator,
    pub containers: ContainerCli,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        bus: Arc<BusClient>,
        hub: Arc<RelayHub>,
        supervisor: Arc<SubscriptionSupervisor>,
    ) -> Self {
        Self {
            health: HealthAggregator::new(config.relay.stream_timeout),
            containers: ContainerCli::new(&config.containers),
            config,
            bus,
            hub,
            supervisor,
            started_at: Instant::now(),
        }
    }
}

/// API server
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.state.config.api.cors_origins);

        routes::create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self.state.config.api_addr().parse().map_err(|_| {
            RelayError::InvalidConfig(format!(
                "invalid API listen address {}",
                self.state.config.api_addr()
            ))
        })?;

        let router = self.build_router();

        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| RelayError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
