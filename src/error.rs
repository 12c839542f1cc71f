//! Error handling module
//!
//! Defines custom error types for the CottFur sync server and client.

use std::io;

use thiserror::Error;

use crate::protocol::codec::PacketDecodeError;

/// Main error type for CottFur sync
#[derive(Error, Debug)]
pub enum CottfurError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Server full ({0} players)")]
    ServerFull(usize),

    #[error("Player already connected: {0}")]
    AlreadyConnected(uuid::Uuid),

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Write buffer full")]
    WriteBufferFull,

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Invalid protocol version: expected {expected}, got {actual}")]
    InvalidVersion { expected: u16, actual: u16 },

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Unexpected packet in state {state}: opcode {opcode:#04x}")]
    UnexpectedPacket { state: String, opcode: u8 },

    #[error("Invalid player id: {0}")]
    InvalidPlayerId(String),

    #[error("Handshake not completed")]
    HandshakeIncomplete,

    #[error("Model config field {field} too long: {length} bytes (max: {max})")]
    ConfigFieldTooLong {
        field: &'static str,
        length: usize,
        max: usize,
    },

    #[error("Disconnected by server: {0}")]
    Disconnected(String),

    #[error(transparent)]
    Decode(#[from] PacketDecodeError),
}

impl From<PacketDecodeError> for CottfurError {
    fn from(err: PacketDecodeError) -> Self {
        CottfurError::Protocol(ProtocolError::Decode(err))
    }
}

/// Result type alias for CottFur operations
pub type Result<T> = std::result::Result<T, CottfurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");

        let err = ProtocolError::InvalidOpcode(0x42);
        assert_eq!(err.to_string(), "Invalid opcode: 0x42");

        let err = ProtocolError::FrameTooLarge {
            size: 4096,
            max: 1024,
        };
        assert_eq!(err.to_string(), "Frame too large: 4096 bytes (max: 1024)");
    }

    #[test]
    fn test_decode_error_conversion() {
        let err: CottfurError = PacketDecodeError::InsufficientData {
            expected: 4,
            actual: 1,
        }
        .into();
        assert!(matches!(
            err,
            CottfurError::Protocol(ProtocolError::Decode(_))
        ));
    }
}
