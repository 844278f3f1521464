use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    acknowledge, health_check, list_unhealthy, mark_unhealthy, receive_alert, service_status,
    AppState,
};
use crate::alerts::{
    EscalationPolicy, LogChannel, PagerService, TargetNotifier, DEFAULT_ACK_TIMEOUT_MINUTES,
};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ack_timeout_minutes: u64,
    pub policies: Vec<EscalationPolicy>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ack_timeout_minutes: DEFAULT_ACK_TIMEOUT_MINUTES,
            policies: Vec::new(),
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Alert intake
        .route("/alerts", post(receive_alert))
        // Monitored services
        .route("/services", get(list_unhealthy))
        .route("/services/:id", get(service_status))
        .route("/services/:id/ack", post(acknowledge))
        .route("/services/:id/unhealthy", post(mark_unhealthy))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = TargetNotifier::new(Arc::new(LogChannel::mail()), Arc::new(LogChannel::sms()));
    let service = PagerService::new(notifier, config.policies, config.ack_timeout_minutes);
    let (pager, pager_task) = service.start();

    let state = Arc::new(AppState { pager });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting pager server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last handle; the pager loop drains and exits
    let _ = pager_task.await;

    tracing::info!("Pager server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");

    tracing::info!("Shutdown signal received, stopping pager...");
}
