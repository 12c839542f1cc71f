//! Client connection
//!
//! Connects to a sync server over TCP, performs the hello/welcome handshake
//! and runs a background task that feeds incoming packets into a
//! [`ModelSyncClient`] and writes its queued frames.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::{CottfurError, NetworkError, ProtocolError, Result};
use crate::model::PlayerModelStore;
use crate::net::transport::{FramedTransport, UnifiedTransport, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::handshake::client_hello;
use crate::protocol::packets::{ClientboundPacket, Welcome};
use crate::sync::ModelSyncClient;

/// Default outbound queue capacity for a client
pub const DEFAULT_CLIENT_QUEUE_SIZE: usize = 64;

/// How long to wait for the welcome
const WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

/// Client connection options
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub player_id: Uuid,
    pub display_name: String,
    pub queue_size: usize,
    pub max_frame_size: usize,
}

impl ConnectOptions {
    pub fn new(player_id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            player_id,
            display_name: display_name.into(),
            queue_size: DEFAULT_CLIENT_QUEUE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// A live connection to a sync server
pub struct ClientConnection {
    sync: Arc<ModelSyncClient>,
    server_name: String,
    close_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ClientConnection {
    /// Connect, complete the handshake and start the background task.
    ///
    /// `models` is the store the connection keeps in sync; it is cleared
    /// when the connection ends.
    pub async fn connect(
        addr: &str,
        options: ConnectOptions,
        models: Arc<PlayerModelStore>,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let mut transport = FramedTransport::new(UnifiedTransport::tcp(stream), options.max_frame_size);

        transport
            .send(&client_hello(options.player_id, options.display_name.clone()))
            .await?;

        let welcome = await_welcome(&mut transport).await?;
        let server_name = welcome.server_name.clone();

        let (outbound_tx, outbound_rx) = mpsc::channel(options.queue_size);
        let sync = Arc::new(ModelSyncClient::new(options.player_id, models, outbound_tx));
        sync.handle_packet(ClientboundPacket::Welcome(welcome))?;

        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run(transport, Arc::clone(&sync), outbound_rx, close_rx));

        info!(
            player_id = %options.player_id,
            server_name = %server_name,
            supported = sync.is_server_supported(),
            "Connected to sync server"
        );

        Ok(Self {
            sync,
            server_name,
            close_tx: Some(close_tx),
            task,
        })
    }

    /// The sync client bound to this connection
    pub fn sync(&self) -> &Arc<ModelSyncClient> {
        &self.sync
    }

    /// The local store
    pub fn models(&self) -> &Arc<PlayerModelStore> {
        self.sync.models()
    }

    /// Name announced by the server
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Whether the background task has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the connection and wait for cleanup
    pub async fn close(mut self) -> Result<()> {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        self.wait().await
    }

    /// Wait until the server ends the connection
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| CottfurError::Internal(format!("connection task failed: {}", e)))?
    }
}

async fn await_welcome(transport: &mut FramedTransport) -> Result<Welcome> {
    let frame = tokio::time::timeout(WELCOME_TIMEOUT, transport.read_frame())
        .await
        .map_err(|_| CottfurError::Network(NetworkError::Timeout))??
        .ok_or(CottfurError::Network(NetworkError::ConnectionClosed))?;

    match ClientboundPacket::decode(&frame)? {
        ClientboundPacket::Welcome(welcome) => Ok(welcome),
        ClientboundPacket::Disconnect(disconnect) => Err(CottfurError::Protocol(
            ProtocolError::Disconnected(disconnect.reason),
        )),
        _ => Err(CottfurError::Protocol(ProtocolError::HandshakeIncomplete)),
    }
}

async fn run(
    mut transport: FramedTransport,
    sync: Arc<ModelSyncClient>,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    mut close_rx: oneshot::Receiver<()>,
) -> Result<()> {
    let result = pump(&mut transport, &sync, &mut outbound_rx, &mut close_rx).await;

    sync.handle_disconnect();
    if let Err(e) = transport.shutdown().await {
        trace!(error = %e, "Error during transport shutdown");
    }

    debug!(player_id = %sync.player_id(), "Connection task ending");
    result
}

async fn pump(
    transport: &mut FramedTransport,
    sync: &ModelSyncClient,
    outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
    close_rx: &mut oneshot::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            frame = transport.read_frame() => match frame? {
                Some(frame) => sync.handle_packet(ClientboundPacket::decode(&frame)?)?,
                None => return Ok(()),
            },
            Some(data) = outbound_rx.recv() => {
                transport.write_frame(&data).await?;
            }
            _ = &mut *close_rx => {
                // Flush updates queued before the close request
                while let Ok(data) = outbound_rx.try_recv() {
                    transport.write_frame(&data).await?;
                }
                return Ok(());
            }
        }
    }
}
