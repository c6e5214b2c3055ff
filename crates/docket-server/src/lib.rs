//! Docket Server
//!
//! The HTTP surface over the Docket pipeline: document ingest and
//! materialization, analysis run lifecycle, checkout sessions, and the
//! payment provider webhook.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::ServerConfig;
use docket_store::SqliteStore;
use handlers::{create_router, AppState};
use tokio::net::TcpListener;
use tracing::info;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Store initialization error
    #[error("Store error: {0}")]
    Store(String),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Start the Docket HTTP server
///
/// Opens the store, builds the service graph, and serves until shutdown.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Docket server");
    info!("Bind address: {}", config.bind_addr());
    info!("Database path: {}", config.database_path);
    info!("Administrators: {}", config.admin_users.len());

    let store =
        SqliteStore::new(&config.database_path).map_err(|e| ServerError::Store(e.to_string()))?;
    let bind_addr = config.bind_addr();
    let state = AppState::new(store, config);
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Docket server listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_test_config_builds_state() {
        let config = ServerConfig::default_test_config();
        let store = SqliteStore::new(":memory:").unwrap();
        let state = AppState::new(store, config);
        assert!(state.config.admin_users.is_empty());
    }
}
