//! Server-side model sync
//!
//! Owns the authoritative store for the connected players. Updates are
//! fanned out with non-blocking enqueues onto each recipient's outbound
//! queue; a full queue drops the message for that recipient only.
//!
//! Joins and updates are serialized on one lock so that a joining session
//! either sees an update in its snapshot or receives it after the snapshot.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{PlayerModelConfig, PlayerModelStore};
use crate::net::session::{Session, SessionManager, SessionState};
use crate::protocol::packets::{Packet, SyncAllModels, SyncSingleModel};

/// Server model sync service
pub struct ModelSyncServer {
    models: Arc<PlayerModelStore>,
    sessions: Arc<SessionManager>,
    enabled: bool,
    /// Held across "store and fan out" and "go in-game and snapshot"
    sync_lock: Mutex<()>,
}

impl ModelSyncServer {
    pub fn new(models: Arc<PlayerModelStore>, sessions: Arc<SessionManager>, enabled: bool) -> Self {
        Self {
            models,
            sessions,
            enabled,
            sync_lock: Mutex::new(()),
        }
    }

    /// The authoritative store
    pub fn models(&self) -> &Arc<PlayerModelStore> {
        &self.models
    }

    /// Whether model sync is enabled on this server
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Move a handshaken session in-game and push it the full snapshot.
    ///
    /// Returns false if nothing was sent because sync is disabled or the
    /// client did not declare the bulk channel.
    pub fn handle_join(&self, session: &Session) -> Result<bool> {
        let _guard = self.sync_lock.lock();
        session.set_state(SessionState::InGame);

        if !self.enabled || !session.supports_packet::<SyncAllModels>() {
            debug!(
                session_id = session.id,
                enabled = self.enabled,
                "Skipping bulk model sync on join"
            );
            return Ok(false);
        }

        let packet: SyncAllModels = self.models.snapshot().into_iter().collect();
        let entries = packet.entries.len();
        session.try_send_packet(&packet)?;

        debug!(
            session_id = session.id,
            entries = entries,
            "Sent bulk model sync"
        );
        Ok(true)
    }

    /// Store the sender's config and relay it to every other in-game session
    /// that declared the single-sync channel. Returns the recipient count.
    pub fn handle_model_update(&self, sender: &Session, config: PlayerModelConfig) -> usize {
        if !self.enabled {
            warn!(
                session_id = sender.id,
                "Model sync disabled, ignoring model update"
            );
            return 0;
        }

        let Some(player_id) = sender.player_id() else {
            warn!(
                session_id = sender.id,
                "Model update from session without a registered player"
            );
            return 0;
        };

        if let Err(e) = config.validate() {
            warn!(
                session_id = sender.id,
                player_id = %player_id,
                error = %e,
                "Rejecting model update"
            );
            return 0;
        }

        debug!(
            session_id = sender.id,
            player_id = %player_id,
            model_type = %config.model_type_id,
            "Received model update"
        );

        let frame = SyncSingleModel::new(player_id, config.clone()).to_frame();
        let mut recipients = 0;

        let guard = self.sync_lock.lock();
        self.models.set(player_id, config);

        self.sessions.for_each_in_game(|session| {
            if session.id == sender.id || !session.supports_packet::<SyncSingleModel>() {
                return;
            }
            match session.try_send(frame.clone()) {
                Ok(()) => recipients += 1,
                Err(e) => warn!(
                    session_id = session.id,
                    player_id = %player_id,
                    error = %e,
                    "Dropped model sync for recipient"
                ),
            }
        });
        drop(guard);

        debug!(
            player_id = %player_id,
            recipients = recipients,
            "Relayed model update"
        );
        recipients
    }

    /// Forget a departed player's config
    pub fn handle_leave(&self, player_id: &Uuid) -> Option<PlayerModelConfig> {
        let removed = self.models.remove(player_id);
        if removed.is_some() {
            info!(player_id = %player_id, "Removed model config for departed player");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::sync::mpsc;

    use std::sync::Barrier;

    use bytes::BytesMut;

    use super::*;
    use crate::model::player_config::MAX_CONFIG_STRING_LENGTH;
    use crate::net::session::PlayerInfo;
    use crate::net::transport::{decode_frame, DEFAULT_MAX_FRAME_SIZE};
    use crate::protocol::handshake::{model_sync_channels, ChannelSet};
    use crate::protocol::packets::{ClientboundPacket, Frame, FRAME_HEADER_LEN};

    struct Peer {
        session: Arc<Session>,
        rx: mpsc::Receiver<Vec<u8>>,
        player_id: Uuid,
    }

    fn join(manager: &SessionManager, channels: ChannelSet) -> Peer {
        let peer = handshaken(manager, channels);
        peer.session.set_state(SessionState::InGame);
        peer
    }

    /// A registered session that has not joined yet
    fn handshaken(manager: &SessionManager, channels: ChannelSet) -> Peer {
        let (tx, rx) = mpsc::channel(8);
        let address: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let session = manager
            .create_session_with_channel(address, false, tx)
            .unwrap();
        let player_id = Uuid::new_v4();
        manager
            .register_player(
                session.id,
                PlayerInfo {
                    player_id,
                    display_name: "peer".to_string(),
                },
                channels,
            )
            .unwrap();
        Peer {
            session,
            rx,
            player_id,
        }
    }

    fn all_channels() -> ChannelSet {
        model_sync_channels().into_iter().collect()
    }

    fn decode(bytes: Vec<u8>) -> ClientboundPacket {
        let frame = Frame::new(bytes[0], bytes[FRAME_HEADER_LEN..].to_vec());
        ClientboundPacket::decode(&frame).unwrap()
    }

    fn setup(enabled: bool) -> (Arc<SessionManager>, ModelSyncServer) {
        let sessions = Arc::new(SessionManager::default());
        let server = ModelSyncServer::new(
            Arc::new(PlayerModelStore::new()),
            Arc::clone(&sessions),
            enabled,
        );
        (sessions, server)
    }

    #[test]
    fn test_update_is_relayed_to_others_only() {
        let (sessions, server) = setup(true);
        let mut a = join(&sessions, all_channels());
        let mut b = join(&sessions, all_channels());

        let config = PlayerModelConfig::new("k9").with_primary_color(0x224466);
        assert_eq!(server.handle_model_update(&a.session, config.clone()), 1);

        assert_eq!(server.models().get(&a.player_id), config);
        assert!(a.rx.try_recv().is_err());
        assert_eq!(
            decode(b.rx.try_recv().unwrap()),
            ClientboundPacket::SyncSingleModel(SyncSingleModel::new(a.player_id, config))
        );
    }

    #[test]
    fn test_update_skips_clients_without_channel() {
        let (sessions, server) = setup(true);
        let a = join(&sessions, all_channels());
        let mut legacy = join(&sessions, ChannelSet::new());

        assert_eq!(
            server.handle_model_update(&a.session, PlayerModelConfig::new("feline")),
            0
        );
        assert!(legacy.rx.try_recv().is_err());
    }

    #[test]
    fn test_update_skips_sessions_still_handshaking() {
        let (sessions, server) = setup(true);
        let a = join(&sessions, all_channels());
        let mut pending = join(&sessions, all_channels());
        pending.session.set_state(SessionState::Connected);

        assert_eq!(
            server.handle_model_update(&a.session, PlayerModelConfig::new("k9")),
            0
        );
        assert!(pending.rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_for_that_recipient_only() {
        let (sessions, server) = setup(true);
        let a = join(&sessions, all_channels());
        let mut slow = join(&sessions, all_channels());
        let mut fast = join(&sessions, all_channels());

        for _ in 0..8 {
            slow.session.try_send(vec![0]).unwrap();
        }

        assert_eq!(
            server.handle_model_update(&a.session, PlayerModelConfig::new("protogen")),
            1
        );
        assert!(fast.rx.try_recv().is_ok());
        assert_eq!(slow.rx.try_recv().unwrap(), vec![0]);
    }

    #[test]
    fn test_disabled_server_ignores_update() {
        let (sessions, server) = setup(false);
        let a = join(&sessions, all_channels());
        let mut b = join(&sessions, all_channels());

        assert_eq!(
            server.handle_model_update(&a.session, PlayerModelConfig::new("k9")),
            0
        );
        assert!(server.models().is_empty());
        assert!(b.rx.try_recv().is_err());
    }

    #[test]
    fn test_join_receives_snapshot() {
        let (sessions, server) = setup(true);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let custom = PlayerModelConfig::new("protogen").with_pattern("stripes");
        server.models().set(a, custom.clone());
        server.models().set(b, PlayerModelConfig::default());

        let mut c = join(&sessions, all_channels());
        assert!(server.handle_join(&c.session).unwrap());

        let ClientboundPacket::SyncAllModels(packet) = decode(c.rx.try_recv().unwrap()) else {
            panic!("expected bulk sync");
        };
        let store = PlayerModelStore::new();
        crate::sync::apply_bulk_sync(&store, &packet);
        assert_eq!(store.snapshot(), server.models().snapshot());
        assert_eq!(store.get(&a), custom);
    }

    #[test]
    fn test_join_without_channel_gets_nothing() {
        let (sessions, server) = setup(true);
        let mut c = join(&sessions, ChannelSet::new());

        assert!(!server.handle_join(&c.session).unwrap());
        assert!(c.rx.try_recv().is_err());
    }

    #[test]
    fn test_join_moves_session_in_game() {
        let (sessions, server) = setup(false);
        let c = handshaken(&sessions, all_channels());
        assert_eq!(c.session.state(), SessionState::Connected);

        assert!(!server.handle_join(&c.session).unwrap());
        assert_eq!(c.session.state(), SessionState::InGame);
    }

    #[test]
    fn test_oversized_update_is_rejected() {
        let (sessions, server) = setup(true);
        let a = join(&sessions, all_channels());
        let mut b = join(&sessions, all_channels());
        let accepted = PlayerModelConfig::new("k9");
        server.handle_model_update(&a.session, accepted.clone());
        b.rx.try_recv().unwrap();

        let oversized = PlayerModelConfig::new("k9").with_custom_texture("a".repeat(32_000));
        assert_eq!(server.handle_model_update(&a.session, oversized), 0);

        assert_eq!(server.models().get(&a.player_id), accepted);
        assert!(b.rx.try_recv().is_err());
    }

    #[test]
    fn test_full_store_snapshot_fits_default_frame() {
        let (sessions, server) = setup(true);
        let widest = PlayerModelConfig::new("k".repeat(MAX_CONFIG_STRING_LENGTH))
            .with_custom_texture("t".repeat(MAX_CONFIG_STRING_LENGTH))
            .with_pattern("p".repeat(MAX_CONFIG_STRING_LENGTH));

        let sender = join(&sessions, ChannelSet::new());
        server.handle_model_update(&sender.session, widest.clone());
        assert_eq!(server.models().get(&sender.player_id), widest);
        for i in 0..499 {
            server.models().set(Uuid::from_u128(i), widest.clone());
        }
        assert_eq!(server.models().len(), 500);

        let mut c = handshaken(&sessions, all_channels());
        assert!(server.handle_join(&c.session).unwrap());

        let mut buf = BytesMut::from(&c.rx.try_recv().unwrap()[..]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        let ClientboundPacket::SyncAllModels(packet) = ClientboundPacket::decode(&frame).unwrap()
        else {
            panic!("expected bulk sync");
        };
        assert_eq!(packet.entries.len(), 500);
        assert!(frame.payload.len() <= SyncAllModels::max_encoded_len(500));
    }

    #[test]
    fn test_join_racing_update_never_leaves_stale_entry() {
        for _ in 0..200 {
            let (sessions, server) = setup(true);
            let a = join(&sessions, all_channels());
            let old = PlayerModelConfig::new("k9");
            let new = PlayerModelConfig::new("protogen");
            server.models().set(a.player_id, old);

            let mut c = handshaken(&sessions, all_channels());
            let barrier = Barrier::new(2);

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    server.handle_model_update(&a.session, new.clone());
                });
                scope.spawn(|| {
                    barrier.wait();
                    server.handle_join(&c.session).unwrap();
                });
            });

            // Apply what C received, in queue order
            let store = PlayerModelStore::new();
            while let Ok(bytes) = c.rx.try_recv() {
                match decode(bytes) {
                    ClientboundPacket::SyncAllModels(packet) => {
                        crate::sync::apply_bulk_sync(&store, &packet);
                    }
                    ClientboundPacket::SyncSingleModel(packet) => {
                        crate::sync::apply_single_sync(&store, &packet);
                    }
                    other => panic!("unexpected packet {:?}", other),
                }
            }
            assert_eq!(store.get(&a.player_id), new);
        }
    }

    #[test]
    fn test_leave_removes_entry() {
        let (_sessions, server) = setup(true);
        let id = Uuid::new_v4();
        server.models().set(id, PlayerModelConfig::new("k9"));

        assert!(server.handle_leave(&id).is_some());
        assert!(server.handle_leave(&id).is_none());
        assert_eq!(server.models().get(&id), PlayerModelConfig::default());
    }
}
