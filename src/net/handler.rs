//! Connection handler module
//!
//! Handles the lifecycle of client connections including:
//! - Initial connection setup (TCP or WebSocket)
//! - Hello/Welcome handshake and capability channels
//! - Routing model updates to the sync service
//! - Draining the session's outbound queue
//! - Graceful disconnection

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, trace, warn};

use crate::error::{CottfurError, NetworkError, ProtocolError, Result};
use crate::net::session::{PlayerInfo, Session, SessionState};
use crate::net::transport::{FramedTransport, UnifiedTransport};
use crate::protocol::handshake::{server_welcome, validate_hello};
use crate::protocol::packets::{Disconnect, Frame, Hello, ServerboundPacket};
use crate::AppState;

/// Connection handler for processing client connections
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
    /// Whether this handler expects WebSocket connections
    is_websocket: bool,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>, is_websocket: bool) -> Self {
        Self {
            state,
            is_websocket,
        }
    }

    /// Handle a TCP connection (native client)
    pub async fn handle_tcp(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling TCP connection");

        stream.set_nodelay(true)?;

        let transport = FramedTransport::new(
            UnifiedTransport::tcp(stream),
            self.state.config.max_frame_size,
        );
        self.handle_connection(transport, addr).await
    }

    /// Handle a WebSocket connection (browser/bridge client)
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");

        // Set TCP options before upgrade
        stream.set_nodelay(true)?;

        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| CottfurError::Network(NetworkError::WebSocket(e.to_string())))?;

        info!(address = %addr, "WebSocket connection established");

        let transport = FramedTransport::new(
            UnifiedTransport::websocket(ws_stream),
            self.state.config.max_frame_size,
        );
        self.handle_connection(transport, addr).await
    }

    /// Run one connection from session creation to cleanup
    async fn handle_connection(&self, mut transport: FramedTransport, addr: SocketAddr) -> Result<()> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(self.state.config.outbound_queue_size);
        let mut shutdown_rx = self.state.shutdown_rx();

        let session = match self.state.session_manager.create_session_with_channel(
            addr,
            self.is_websocket,
            outbound_tx,
        ) {
            Ok(session) => session,
            Err(e @ CottfurError::Network(NetworkError::ServerFull(_))) => {
                warn!(address = %addr, "Rejecting connection, server full");
                reject(&mut transport, "Server is full").await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        debug!(
            session_id = session.id,
            address = %session.address,
            "Starting connection handler"
        );

        let result = self
            .process_connection(&mut transport, &session, &mut outbound_rx, &mut shutdown_rx)
            .await;

        match &result {
            Ok(()) => debug!(session_id = session.id, "Connection handler ending"),
            Err(CottfurError::Network(NetworkError::ConnectionClosed)) => {
                debug!(session_id = session.id, "Connection closed");
            }
            Err(e) => warn!(session_id = session.id, error = %e, "Connection error"),
        }

        // Drop the store entry before the id can be registered again
        if let Some(player_id) = session.player_id() {
            self.state.sync.handle_leave(&player_id);
        }
        self.state.session_manager.remove(session.id);

        if let Err(e) = transport.shutdown().await {
            trace!(session_id = session.id, error = %e, "Error during transport shutdown");
        }

        match result {
            Err(CottfurError::Network(NetworkError::ConnectionClosed)) => Ok(()),
            other => other,
        }
    }

    /// Handshake, then serve frames until the peer leaves or the server stops
    async fn process_connection(
        &self,
        transport: &mut FramedTransport,
        session: &Arc<Session>,
        outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let hello = tokio::select! {
            hello = self.await_hello(transport) => hello,
            _ = shutdown_rx.recv() => return Ok(()),
        };

        let hello = match hello {
            Ok(hello) => hello,
            Err(e) => {
                if let CottfurError::Protocol(ref err) = e {
                    reject(transport, &err.to_string()).await;
                }
                return Err(e);
            }
        };

        self.complete_handshake(transport, session, hello).await?;

        loop {
            tokio::select! {
                frame = transport.read_frame() => match frame? {
                    Some(frame) => self.handle_frame(session, frame)?,
                    None => {
                        debug!(session_id = session.id, "Peer closed connection");
                        break;
                    }
                },
                Some(data) = outbound_rx.recv() => {
                    transport.write_frame(&data).await?;
                }
                _ = shutdown_rx.recv() => {
                    session.set_state(SessionState::Disconnecting);
                    reject(transport, "Server shutting down").await;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait for the client's hello within the handshake timeout
    async fn await_hello(&self, transport: &mut FramedTransport) -> Result<Hello> {
        let frame = tokio::time::timeout(self.state.config.handshake_timeout(), transport.read_frame())
            .await
            .map_err(|_| CottfurError::Network(NetworkError::Timeout))??
            .ok_or(CottfurError::Network(NetworkError::ConnectionClosed))?;

        match ServerboundPacket::decode(&frame)? {
            ServerboundPacket::Hello(hello) => Ok(hello),
            other => Err(CottfurError::Protocol(ProtocolError::UnexpectedPacket {
                state: SessionState::Connected.name().to_string(),
                opcode: other.opcode(),
            })),
        }
    }

    /// Validate the hello, register the player and send the welcome
    async fn complete_handshake(
        &self,
        transport: &mut FramedTransport,
        session: &Arc<Session>,
        hello: Hello,
    ) -> Result<()> {
        let (player_id, channels) = match validate_hello(&hello) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(session_id = session.id, error = %e, "Rejecting hello");
                reject(transport, &e.to_string()).await;
                return Err(e.into());
            }
        };

        let display_name = hello.display_name.clone();
        let info = PlayerInfo {
            player_id,
            display_name: hello.display_name,
        };
        if let Err(e) = self
            .state
            .session_manager
            .register_player(session.id, info, channels)
        {
            warn!(session_id = session.id, player_id = %player_id, error = %e, "Rejecting hello");
            reject(transport, &e.to_string()).await;
            return Err(e);
        }

        let welcome = server_welcome(
            self.state.config.server_name.clone(),
            self.state.sync.is_enabled(),
        );
        transport.send(&welcome).await?;

        // Goes in-game and queues the snapshot in one step
        if let Err(e) = self.state.sync.handle_join(session) {
            warn!(session_id = session.id, error = %e, "Failed to queue bulk model sync");
        }
        info!(
            session_id = session.id,
            player_id = %player_id,
            display_name = %display_name,
            "Player joined"
        );

        Ok(())
    }

    /// Handle one frame from an in-game session
    fn handle_frame(&self, session: &Session, frame: Frame) -> Result<()> {
        trace!(
            session_id = session.id,
            opcode = frame.opcode,
            len = frame.payload.len(),
            "Received frame"
        );

        match ServerboundPacket::decode(&frame)? {
            ServerboundPacket::UpdateModel(update) => {
                self.state.sync.handle_model_update(session, update.config);
                Ok(())
            }
            other => Err(CottfurError::Protocol(ProtocolError::UnexpectedPacket {
                state: session.state().name().to_string(),
                opcode: other.opcode(),
            })),
        }
    }
}

/// Best-effort disconnect notice before closing
async fn reject(transport: &mut FramedTransport, reason: &str) {
    if let Err(e) = transport.send(&Disconnect::new(reason)).await {
        trace!(error = %e, "Failed to send disconnect");
    }
}
