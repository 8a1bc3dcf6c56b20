//! # parlor-server
//!
//! Real-time messaging and notification sync server.
//!
//! This binary provides:
//! - **REST API** (axum) for groups, messages, notifications and the shared
//!   contact inbox; every mutation persists first, then recomputes unread
//!   counters and pushes events
//! - **WebSocket endpoint** that delivers those events to each connected
//!   device through its personal room
//! - **Idle-session reaper** that disconnects sockets which stopped sending
//!   heartbeats

mod api;
mod auth;
mod config;
mod coordinator;
mod error;
mod fanout;
mod guard;
mod protocol;
mod read_state;
mod registry;
mod unread;
mod ws;

use std::sync::Arc;

use parlor_shared::constants::APP_NAME;
use parlor_store::{Database, SharedDatabase};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::auth::PrincipalDirectory;
use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::registry::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parlor_server=debug")),
        )
        .init();

    info!("Starting {APP_NAME} server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = SharedDatabase::new(Database::open_at(&config.database_path)?);

    let principals = match &config.principals_file {
        Some(path) => {
            let directory = PrincipalDirectory::load(path)?;
            info!(path = %path.display(), principals = directory.len(), "Loaded principal directory");
            directory
        }
        None => PrincipalDirectory::default(),
    };
    if principals.is_empty() {
        warn!("No principals configured, every authenticated request will be rejected");
    }

    if config.notification_curator.is_none() {
        warn!("NOTIFICATION_CURATOR_ID not set, system notifications are visible to nobody");
    }

    let registry = SessionRegistry::new(config.session_buffer);
    let coordinator = Coordinator::new(
        db,
        registry.clone(),
        config.notification_curator,
        config.mutation_timeout,
    );

    let app_state = AppState {
        coordinator,
        registry: registry.clone(),
        principals: Arc::new(principals),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Disconnect sessions that missed their heartbeat.
    let heartbeat_timeout = config.heartbeat_timeout;
    let mut interval = tokio::time::interval(config.reaper_interval);
    tokio::spawn(async move {
        loop {
            interval.tick().await;
            let reaped = registry.reap_idle(heartbeat_timeout).await;
            if !reaped.is_empty() {
                info!(count = reaped.len(), "Reaped idle sessions");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
