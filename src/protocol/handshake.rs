//! Handshake protocol
//!
//! A connection opens with the client's [`Hello`], declaring its protocol
//! version, player id and the channels it handles. The server answers with
//! [`Welcome`] listing the channels it accepts, or with a `Disconnect`.
//!
//! The channel lists are the only capability negotiation: a peer never sends
//! a channel packet the other side did not declare.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::ProtocolError;
use crate::protocol::packets::{
    ChannelPacket, Hello, SyncAllModels, SyncSingleModel, UpdateModel, Welcome,
};

/// Protocol version (must match between client and server)
pub const PROTOCOL_VERSION: u16 = 1;

/// Set of declared channel names
pub type ChannelSet = HashSet<String>;

/// Every model sync channel
pub fn model_sync_channels() -> Vec<String> {
    vec![
        UpdateModel::CHANNEL.to_string(),
        SyncAllModels::CHANNEL.to_string(),
        SyncSingleModel::CHANNEL.to_string(),
    ]
}

/// Build the client greeting
pub fn client_hello(player_id: Uuid, display_name: impl Into<String>) -> Hello {
    Hello {
        protocol_version: PROTOCOL_VERSION,
        player_id: player_id.hyphenated().to_string(),
        display_name: display_name.into(),
        channels: model_sync_channels(),
    }
}

/// Build the server reply; a server with model sync disabled declares nothing
pub fn server_welcome(server_name: impl Into<String>, model_sync_enabled: bool) -> Welcome {
    Welcome {
        server_name: server_name.into(),
        channels: if model_sync_enabled {
            model_sync_channels()
        } else {
            Vec::new()
        },
    }
}

/// Check a greeting and extract the player id and declared channels
pub fn validate_hello(hello: &Hello) -> Result<(Uuid, ChannelSet), ProtocolError> {
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err(ProtocolError::InvalidVersion {
            expected: PROTOCOL_VERSION,
            actual: hello.protocol_version,
        });
    }

    let player_id = Uuid::parse_str(&hello.player_id)
        .map_err(|_| ProtocolError::InvalidPlayerId(hello.player_id.clone()))?;

    Ok((player_id, hello.channels.iter().cloned().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_hello_declares_all_channels() {
        let id = Uuid::new_v4();
        let hello = client_hello(id, "Rin");

        let (player_id, channels) = validate_hello(&hello).unwrap();
        assert_eq!(player_id, id);
        assert!(channels.contains("cottfur:update_model"));
        assert!(channels.contains("cottfur:sync_all_models"));
        assert!(channels.contains("cottfur:sync_single_model"));
    }

    #[test]
    fn test_version_mismatch() {
        let mut hello = client_hello(Uuid::new_v4(), "Rin");
        hello.protocol_version = PROTOCOL_VERSION + 1;

        assert!(matches!(
            validate_hello(&hello),
            Err(ProtocolError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_malformed_player_id() {
        let mut hello = client_hello(Uuid::new_v4(), "Rin");
        hello.player_id = "not-a-uuid".to_string();

        assert!(matches!(
            validate_hello(&hello),
            Err(ProtocolError::InvalidPlayerId(_))
        ));
    }

    #[test]
    fn test_disabled_server_declares_nothing() {
        assert!(server_welcome("test", false).channels.is_empty());
        assert_eq!(server_welcome("test", true).channels.len(), 3);
    }
}
