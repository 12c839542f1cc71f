//! Protocol module
//!
//! This module contains the wire protocol of the model sync service:
//! - Ordered-field record codec shared by every payload
//! - Frame layout, opcodes and packet structures
//! - Handshake and capability channels

pub mod codec;
pub mod handshake;
pub mod packets;
