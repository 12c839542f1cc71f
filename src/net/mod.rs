//! Networking module
//!
//! This module handles all network-related functionality for the sync service:
//! - TCP socket handling for native clients
//! - WebSocket handling for browser/bridge clients
//! - Frame buffering and primitive encoding
//! - Session management
//! - Connection lifecycle on both the server and the client side

pub mod buffer;
pub mod connection;
pub mod handler;
pub mod listener;
pub mod session;
pub mod transport;
