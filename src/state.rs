//! Application state module
//!
//! Contains the shared state used across all server connections.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::model::PlayerModelStore;
use crate::net::session::SessionManager;
use crate::sync::ModelSyncServer;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Session manager for tracking connected clients
    pub session_manager: Arc<SessionManager>,
    /// Authoritative player model store
    pub models: Arc<PlayerModelStore>,
    /// Model sync service
    pub sync: ModelSyncServer,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Self {
        let session_manager = Arc::new(SessionManager::new(config.max_players as usize));
        let models = Arc::new(PlayerModelStore::new());
        let sync = ModelSyncServer::new(
            Arc::clone(&models),
            Arc::clone(&session_manager),
            config.model_sync_enabled,
        );

        info!(
            max_players = config.max_players,
            model_sync_enabled = config.model_sync_enabled,
            "Application state initialized"
        );

        Self {
            config,
            session_manager,
            models,
            sync,
            shutdown_tx,
        }
    }

    /// Subscribe to the shutdown signal
    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_shares_store_with_sync() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(ServerConfig::default(), shutdown_tx);

        state
            .models
            .set(uuid::Uuid::new_v4(), crate::model::PlayerModelConfig::new("k9"));

        assert_eq!(state.sync.models().len(), 1);
        assert!(state.sync.is_enabled());
        assert_eq!(state.session_manager.max_sessions(), 500);
    }
}
