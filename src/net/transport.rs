//! Transport abstraction module
//!
//! Provides a unified interface for TCP and WebSocket connections so that
//! native clients (TCP) and browser/bridge clients (WebSocket binary messages)
//! share the same framing and protocol handling code.

use bytes::{Buf, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{CottfurError, NetworkError, ProtocolError, Result};
use crate::protocol::packets::{Frame, Packet, FRAME_HEADER_LEN};

/// Read chunk size
const READ_CHUNK_SIZE: usize = 8192;

/// Default maximum frame payload size (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20;

/// Unified transport enum for handling both TCP and WebSocket connections
pub enum UnifiedTransport {
    Tcp(TcpStream),
    WebSocket(Box<WebSocketStream<TcpStream>>),
}

impl UnifiedTransport {
    /// Create a TCP transport
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }

    /// Create a WebSocket transport from an already-upgraded stream
    pub fn websocket(stream: WebSocketStream<TcpStream>) -> Self {
        Self::WebSocket(Box::new(stream))
    }

    /// Check if this is a WebSocket transport
    pub fn is_websocket(&self) -> bool {
        matches!(self, Self::WebSocket(_))
    }

    /// Append the next chunk of incoming bytes to `buf`.
    ///
    /// Returns the number of bytes appended, 0 once the peer closed. Cancel
    /// safe: nothing is lost if the future is dropped before completing.
    pub async fn read_into(&mut self, buf: &mut BytesMut) -> Result<usize> {
        match self {
            Self::Tcp(stream) => {
                buf.reserve(READ_CHUNK_SIZE);
                stream
                    .read_buf(buf)
                    .await
                    .map_err(|e| CottfurError::Network(NetworkError::ReadError(e.to_string())))
            }
            Self::WebSocket(ws) => loop {
                match ws.next().await {
                    Some(Ok(Message::Binary(data))) => {
                        trace!(len = data.len(), "Received binary WebSocket message");
                        buf.extend_from_slice(&data);
                        return Ok(data.len());
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary for protocol handling
                        buf.extend_from_slice(text.as_bytes());
                        return Ok(text.len());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket closed by peer");
                        return Ok(0);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(CottfurError::Network(NetworkError::WebSocket(
                            e.to_string(),
                        )));
                    }
                }
            },
        }
    }

    /// Write all data to the transport
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(stream) => {
                stream
                    .write_all(data)
                    .await
                    .map_err(|e| CottfurError::Network(NetworkError::WriteError(e.to_string())))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| CottfurError::Network(NetworkError::WriteError(e.to_string())))
            }
            Self::WebSocket(ws) => ws
                .send(Message::Binary(data.to_vec()))
                .await
                .map_err(|e| CottfurError::Network(NetworkError::WebSocket(e.to_string()))),
        }
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Tcp(stream) => stream
                .shutdown()
                .await
                .map_err(|e| CottfurError::Network(NetworkError::WriteError(e.to_string()))),
            Self::WebSocket(ws) => ws
                .close(None)
                .await
                .map_err(|e| CottfurError::Network(NetworkError::WebSocket(e.to_string()))),
        }
    }
}

/// Split one complete frame off the front of `buf`, if there is one
pub fn decode_frame(buf: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if length > max_frame_size {
        return Err(CottfurError::Protocol(ProtocolError::FrameTooLarge {
            size: length,
            max: max_frame_size,
        }));
    }

    let total = FRAME_HEADER_LEN + length;
    if buf.len() < total {
        buf.reserve(total - buf.len());
        return Ok(None);
    }

    let opcode = buf[0];
    buf.advance(FRAME_HEADER_LEN);
    let payload = buf.split_to(length).to_vec();
    Ok(Some(Frame::new(opcode, payload)))
}

/// Frame-level transport with its own read buffer
pub struct FramedTransport {
    transport: UnifiedTransport,
    read_buffer: BytesMut,
    max_frame_size: usize,
}

impl FramedTransport {
    /// Create a new framed transport
    pub fn new(transport: UnifiedTransport, max_frame_size: usize) -> Self {
        Self {
            transport,
            read_buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_frame_size,
        }
    }

    /// Check if this is a WebSocket transport
    pub fn is_websocket(&self) -> bool {
        self.transport.is_websocket()
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed cleanly between frames. Cancel
    /// safe: partial frames stay buffered, so this can sit in a `select!`.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = decode_frame(&mut self.read_buffer, self.max_frame_size)? {
                return Ok(Some(frame));
            }

            let read = self.transport.read_into(&mut self.read_buffer).await?;
            if read == 0 {
                if self.read_buffer.is_empty() {
                    return Ok(None);
                }
                return Err(CottfurError::Network(NetworkError::ConnectionClosed));
            }
        }
    }

    /// Write an already-encoded frame
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.transport.write_all(frame).await
    }

    /// Encode and write a packet
    pub async fn send<P: Packet>(&mut self, packet: &P) -> Result<()> {
        self.write_frame(&packet.to_frame()).await
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        self.transport.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::protocol::codec::WireCodec;
    use crate::protocol::packets::Disconnect;

    #[test]
    fn test_decode_frame_waits_for_complete_frame() {
        let bytes = Frame::new(0x02, vec![9, 8, 7]).encode();
        let mut buf = BytesMut::new();

        for (i, byte) in bytes.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let frame = decode_frame(&mut buf, 1024).unwrap();
            if i + 1 < bytes.len() {
                assert!(frame.is_none());
            } else {
                assert_eq!(frame, Some(Frame::new(0x02, vec![9, 8, 7])));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_frame_back_to_back() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&Frame::new(0x01, vec![1]).encode());
        buf.extend_from_slice(&Frame::new(0x03, vec![]).encode());

        assert_eq!(
            decode_frame(&mut buf, 1024).unwrap(),
            Some(Frame::new(0x01, vec![1]))
        );
        assert_eq!(
            decode_frame(&mut buf, 1024).unwrap(),
            Some(Frame::new(0x03, vec![]))
        );
        assert_eq!(decode_frame(&mut buf, 1024).unwrap(), None);
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x11, 0x00, 0x01, 0x00, 0x00]);

        assert!(matches!(
            decode_frame(&mut buf, 1024),
            Err(CottfurError::Protocol(ProtocolError::FrameTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_tcp_frames_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport =
                FramedTransport::new(UnifiedTransport::tcp(stream), DEFAULT_MAX_FRAME_SIZE);
            let frame = transport.read_frame().await.unwrap().unwrap();
            let eof = transport.read_frame().await.unwrap();
            (frame, eof)
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = FramedTransport::new(UnifiedTransport::tcp(stream), DEFAULT_MAX_FRAME_SIZE);
        assert!(!client.is_websocket());
        client.send(&Disconnect::new("bye")).await.unwrap();
        client.shutdown().await.unwrap();

        let (frame, eof) = server.await.unwrap();
        assert_eq!(frame, Frame::new(0x03, Disconnect::new("bye").to_bytes()));
        assert!(eof.is_none());
    }
}
