//! Pager Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - PAGER_HOST: Bind address (default: 0.0.0.0)
//! - PAGER_PORT: Port number (default: 8080)
//! - PAGER_POLICIES: Path to the JSON policy file (default: none, no service is monitored)
//! - PAGER_ACK_TIMEOUT_MINUTES: Acknowledgement window, overrides the policy file (default: 15)
//! - RUST_LOG: Log level (default: info)

use pager::alerts::PolicyFile;
use pager::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pager=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("PAGER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PAGER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let policy_file = match std::env::var("PAGER_POLICIES") {
        Ok(path) => PolicyFile::load(&path)?,
        Err(_) => {
            tracing::warn!("PAGER_POLICIES not set, starting without escalation policies");
            PolicyFile::default()
        }
    };

    let ack_timeout_minutes = std::env::var("PAGER_ACK_TIMEOUT_MINUTES")
        .ok()
        .and_then(|m| m.parse().ok())
        .unwrap_or(policy_file.ack_timeout_minutes);

    let config = ServerConfig {
        host,
        port,
        ack_timeout_minutes,
        policies: policy_file.policies(),
    };

    tracing::info!("Pager configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Acknowledgement timeout: {} minutes", config.ack_timeout_minutes);
    tracing::info!("  Escalation policies: {}", config.policies.len());
    for policy in &config.policies {
        tracing::info!(
            "    - {} ({} levels)",
            policy.monitored_service_id(),
            policy.level_count()
        );
    }

    run_server(config).await
}
