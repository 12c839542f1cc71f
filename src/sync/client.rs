//! Client-side model sync
//!
//! Each client session owns its own [`PlayerModelStore`]. The store is
//! cleared when the connection ends.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CottfurError, NetworkError, ProtocolError, Result};
use crate::model::{PlayerModelConfig, PlayerModelStore};
use crate::protocol::handshake::ChannelSet;
use crate::protocol::packets::{ChannelPacket, ClientboundPacket, Packet, UpdateModel};
use crate::sync::{apply_bulk_sync, apply_single_sync};

/// Client model sync service
pub struct ModelSyncClient {
    player_id: Uuid,
    models: Arc<PlayerModelStore>,
    /// Channels the server declared in its welcome
    server_channels: RwLock<ChannelSet>,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl ModelSyncClient {
    pub fn new(
        player_id: Uuid,
        models: Arc<PlayerModelStore>,
        outbound: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        Self {
            player_id,
            models,
            server_channels: RwLock::new(ChannelSet::new()),
            outbound,
        }
    }

    /// The local player's id
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// The local store
    pub fn models(&self) -> &Arc<PlayerModelStore> {
        &self.models
    }

    /// Record the channels the server declared
    pub fn set_server_channels<I>(&self, channels: I)
    where
        I: IntoIterator<Item = String>,
    {
        *self.server_channels.write() = channels.into_iter().collect();
    }

    /// Whether the server accepts model updates
    pub fn is_server_supported(&self) -> bool {
        self.server_channels.read().contains(UpdateModel::CHANNEL)
    }

    /// Send the local player's config to the server.
    ///
    /// Returns `Ok(false)` without sending when the server does not support
    /// model sync or the outbound queue is full. Fails if the config has an
    /// oversized id or the connection is gone.
    pub fn send_model_update(&self, config: &PlayerModelConfig) -> Result<bool> {
        config.validate()?;

        if !self.is_server_supported() {
            warn!(
                player_id = %self.player_id,
                "Server does not support model sync, not sending update"
            );
            return Ok(false);
        }

        let packet = UpdateModel {
            config: config.clone(),
        };
        match self.outbound.try_send(packet.to_frame()) {
            Ok(()) => {
                debug!(
                    player_id = %self.player_id,
                    model_type = %config.model_type_id,
                    "Sent model update"
                );
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(player_id = %self.player_id, "Outbound queue full, dropping model update");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(CottfurError::Network(NetworkError::ConnectionClosed))
            }
        }
    }

    /// Store the local player's own config and push it to the server. The
    /// server never echoes an update back to its sender.
    pub fn apply_local_config(&self, config: PlayerModelConfig) -> Result<bool> {
        config.validate()?;
        self.models.set(self.player_id, config.clone());
        self.send_model_update(&config)
    }

    /// Dispatch one packet from the server
    pub fn handle_packet(&self, packet: ClientboundPacket) -> Result<()> {
        match packet {
            ClientboundPacket::Welcome(welcome) => {
                info!(
                    server_name = %welcome.server_name,
                    channels = welcome.channels.len(),
                    "Connected to server"
                );
                self.set_server_channels(welcome.channels);
            }
            ClientboundPacket::Disconnect(disconnect) => {
                return Err(CottfurError::Protocol(ProtocolError::Disconnected(
                    disconnect.reason,
                )));
            }
            ClientboundPacket::SyncAllModels(packet) => {
                apply_bulk_sync(&self.models, &packet);
            }
            ClientboundPacket::SyncSingleModel(packet) => {
                apply_single_sync(&self.models, &packet);
            }
        }
        Ok(())
    }

    /// Tear down per-connection state
    pub fn handle_disconnect(&self) {
        let dropped = self.models.len();
        self.models.clear();
        self.server_channels.write().clear();
        info!(
            player_id = %self.player_id,
            dropped = dropped,
            "Cleared model store after disconnect"
        );
    }
}
