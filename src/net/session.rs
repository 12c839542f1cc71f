//! Session management module
//!
//! Manages client sessions including:
//! - Session lifecycle (creation, tracking, cleanup)
//! - Session state machine (handshake -> in game)
//! - Per-session data (player identity, declared channels)
//! - Thread-safe session registry

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CottfurError, NetworkError, Result};
use crate::protocol::handshake::ChannelSet;
use crate::protocol::packets::{ChannelPacket, Packet};

/// Unique session identifier
pub type SessionId = u64;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Initial state - waiting for hello
    Connected,
    /// Handshake completed, player registered
    InGame,
    /// Session is disconnecting
    Disconnecting,
    /// Session has been disconnected
    Disconnected,
}

impl SessionState {
    /// Check if the session is in a state where it can receive sync packets
    pub fn can_receive_sync(&self) -> bool {
        matches!(self, SessionState::InGame)
    }

    /// Check if the session is still active (not disconnecting/disconnected)
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            SessionState::Disconnecting | SessionState::Disconnected
        )
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Connected => "Connected",
            SessionState::InGame => "InGame",
            SessionState::Disconnecting => "Disconnecting",
            SessionState::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Player identity announced in the hello
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub player_id: Uuid,
    pub display_name: String,
}

/// A connected client session
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Remote address of the client
    pub address: SocketAddr,
    /// Current session state
    state: RwLock<SessionState>,
    /// Whether this is a WebSocket connection
    pub is_websocket: bool,
    /// Player identity (set after the handshake)
    player: RwLock<Option<PlayerInfo>>,
    /// Channels the client declared
    channels: RwLock<ChannelSet>,
    /// Time of session creation
    pub created_at: Instant,
    /// Outbound message channel (for sending frames)
    outbound_tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl Session {
    /// Create a new session
    pub fn new(id: SessionId, address: SocketAddr, is_websocket: bool) -> Self {
        Self {
            id,
            address,
            state: RwLock::new(SessionState::Connected),
            is_websocket,
            player: RwLock::new(None),
            channels: RwLock::new(ChannelSet::new()),
            created_at: Instant::now(),
            outbound_tx: None,
        }
    }

    /// Create a new session with an outbound channel
    pub fn with_channel(
        id: SessionId,
        address: SocketAddr,
        is_websocket: bool,
        outbound_tx: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        let mut session = Self::new(id, address, is_websocket);
        session.outbound_tx = Some(outbound_tx);
        session
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Set the session state
    pub fn set_state(&self, new_state: SessionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };
        debug!(
            session_id = self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Session state changed"
        );
    }

    /// Transition to a new state if currently in the expected state
    pub fn transition_state(&self, expected: SessionState, new_state: SessionState) -> bool {
        let mut state = self.state.write();
        if *state == expected {
            *state = new_state;
            true
        } else {
            false
        }
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Get the player identity
    pub fn player(&self) -> Option<PlayerInfo> {
        self.player.read().clone()
    }

    /// Get the player id
    pub fn player_id(&self) -> Option<Uuid> {
        self.player.read().as_ref().map(|p| p.player_id)
    }

    /// Replace the declared channel set
    pub fn set_channels(&self, channels: ChannelSet) {
        *self.channels.write() = channels;
    }

    /// Whether the client declared a channel
    pub fn supports(&self, channel: &str) -> bool {
        self.channels.read().contains(channel)
    }

    /// Whether the client declared the channel a packet travels on
    pub fn supports_packet<P: ChannelPacket>(&self) -> bool {
        self.supports(P::CHANNEL)
    }

    /// Send data to the client (if channel is available)
    pub async fn send(&self, data: Vec<u8>) -> Result<()> {
        if let Some(tx) = &self.outbound_tx {
            tx.send(data)
                .await
                .map_err(|_| CottfurError::Network(NetworkError::ConnectionClosed))?;
        }
        Ok(())
    }

    /// Try to send data without blocking
    pub fn try_send(&self, data: Vec<u8>) -> Result<()> {
        if let Some(tx) = &self.outbound_tx {
            tx.try_send(data).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    CottfurError::Network(NetworkError::WriteBufferFull)
                }
                mpsc::error::TrySendError::Closed(_) => {
                    CottfurError::Network(NetworkError::ConnectionClosed)
                }
            })?;
        }
        Ok(())
    }

    /// Encode a packet and queue it without blocking
    pub fn try_send_packet<P: Packet>(&self, packet: &P) -> Result<()> {
        self.try_send(packet.to_frame())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("is_websocket", &self.is_websocket)
            .field("player", &self.player())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Thread-safe session manager
pub struct SessionManager {
    /// Map of session ID to session
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Map of player id to session ID (for registered players)
    player_to_session: DashMap<Uuid, SessionId>,
    /// Next session ID to assign
    next_id: AtomicU64,
    /// Maximum concurrent sessions
    max_sessions: usize,
}

impl SessionManager {
    /// Create a session manager with a session limit
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            player_to_session: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_sessions,
        }
    }

    /// Create a session with an outbound channel
    pub fn create_session_with_channel(
        &self,
        address: SocketAddr,
        is_websocket: bool,
        outbound_tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<Arc<Session>> {
        let current_count = self.sessions.len();
        if current_count >= self.max_sessions {
            warn!(
                address = %address,
                count = current_count,
                max = self.max_sessions,
                "Session limit reached"
            );
            return Err(CottfurError::Network(NetworkError::ServerFull(
                self.max_sessions,
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(Session::with_channel(
            id,
            address,
            is_websocket,
            outbound_tx,
        ));

        self.sessions.insert(id, session.clone());

        info!(
            session_id = id,
            address = %address,
            is_websocket = is_websocket,
            "Session created"
        );

        Ok(session)
    }

    /// Get a session by ID
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| r.clone())
    }

    /// Get a session by player id
    pub fn get_by_player(&self, player_id: &Uuid) -> Option<Arc<Session>> {
        self.player_to_session
            .get(player_id)
            .and_then(|id| self.get(*id))
    }

    /// Check if a player is currently connected
    pub fn is_connected(&self, player_id: &Uuid) -> bool {
        self.player_to_session.contains_key(player_id)
    }

    /// Bind a player identity and its declared channels to a session.
    ///
    /// Fails if the player id is already bound to another live session.
    pub fn register_player(
        &self,
        session_id: SessionId,
        info: PlayerInfo,
        channels: ChannelSet,
    ) -> Result<Arc<Session>> {
        let session = self
            .get(session_id)
            .ok_or(CottfurError::Network(NetworkError::SessionNotFound(
                session_id,
            )))?;

        match self.player_to_session.entry(info.player_id) {
            Entry::Occupied(_) => {
                return Err(CottfurError::Network(NetworkError::AlreadyConnected(
                    info.player_id,
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(session_id);
            }
        }

        debug!(
            session_id = session_id,
            player_id = %info.player_id,
            display_name = %info.display_name,
            channels = channels.len(),
            "Player registered for session"
        );

        session.set_channels(channels);
        *session.player.write() = Some(info);

        Ok(session)
    }

    /// Remove a session
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;

        if let Some(player_id) = session.player_id() {
            self.player_to_session
                .remove_if(&player_id, |_, session_id| *session_id == id);
        }
        session.set_state(SessionState::Disconnected);

        info!(
            session_id = id,
            player_id = ?session.player_id(),
            "Session removed"
        );

        Some(session)
    }

    /// Mark every session as disconnecting; handlers observe the shutdown
    /// signal and clean up after themselves
    pub fn disconnect_all(&self) {
        for session in self.sessions.iter() {
            session.set_state(SessionState::Disconnecting);
        }
    }

    /// Get the count of active sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Get the count of sessions per state
    pub fn count_by_state(&self) -> HashMap<SessionState, usize> {
        let mut counts = HashMap::new();
        for session in self.sessions.iter() {
            *counts.entry(session.state()).or_insert(0) += 1;
        }
        counts
    }

    /// Get the count of registered players
    pub fn player_count(&self) -> usize {
        self.player_to_session.len()
    }

    /// Maximum concurrent sessions
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Iterate over all in-game sessions
    pub fn for_each_in_game<F>(&self, mut f: F)
    where
        F: FnMut(&Session),
    {
        for session in self.sessions.iter() {
            if session.state().can_receive_sync() {
                f(&session);
            }
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(1000)
    }
}
