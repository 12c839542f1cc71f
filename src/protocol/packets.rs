//! Packet definitions module
//!
//! Defines the frame layout, opcodes and payload structures of the sync
//! protocol.
//!
//! Frame layout: `opcode: u8`, `length: u32` (big-endian), `payload[length]`.

use uuid::Uuid;

use crate::model::PlayerModelConfig;
use crate::protocol::codec::{PacketDecodeError, WireCodec};
use crate::wire_record;

/// Size of the frame header (opcode + payload length)
pub const FRAME_HEADER_LEN: usize = 5;

/// Opcodes
pub mod opcode {
    pub const HELLO: u8 = 0x01;
    pub const WELCOME: u8 = 0x02;
    pub const DISCONNECT: u8 = 0x03;
    pub const UPDATE_MODEL: u8 = 0x10;
    pub const SYNC_ALL_MODELS: u8 = 0x11;
    pub const SYNC_SINGLE_MODEL: u8 = 0x12;
}

/// One undecoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: u8, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// Serialize header and payload
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        out.push(self.opcode);
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// A payload with a fixed opcode
pub trait Packet: WireCodec {
    /// The packet opcode
    const OPCODE: u8;

    /// Encode into a complete frame ready for the transport
    fn to_frame(&self) -> Vec<u8> {
        Frame::new(Self::OPCODE, self.to_bytes()).encode()
    }
}

/// A payload carried on a named capability channel.
///
/// Peers declare which channels they handle during the handshake; a packet is
/// only sent to a peer that declared its channel.
pub trait ChannelPacket: Packet {
    const CHANNEL: &'static str;
}

// ============ Handshake ============

/// First frame from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub protocol_version: u16,
    /// Canonical hyphenated player id
    pub player_id: String,
    pub display_name: String,
    /// Channels this client handles
    pub channels: Vec<String>,
}

wire_record!(Hello {
    protocol_version,
    player_id,
    display_name,
    channels,
});

impl Packet for Hello {
    const OPCODE: u8 = opcode::HELLO;
}

/// Server reply to a successful [`Hello`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub server_name: String,
    /// Channels this server accepts
    pub channels: Vec<String>,
}

wire_record!(Welcome {
    server_name,
    channels
});

impl Packet for Welcome {
    const OPCODE: u8 = opcode::WELCOME;
}

/// Sent by the server right before it closes a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: String,
}

wire_record!(Disconnect { reason });

impl Packet for Disconnect {
    const OPCODE: u8 = opcode::DISCONNECT;
}

impl Disconnect {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// ============ Model sync ============

/// Client to server: the sender's new config. The player is implied by the
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateModel {
    pub config: PlayerModelConfig,
}

wire_record!(UpdateModel { config });

impl Packet for UpdateModel {
    const OPCODE: u8 = opcode::UPDATE_MODEL;
}

impl ChannelPacket for UpdateModel {
    const CHANNEL: &'static str = "cottfur:update_model";
}

/// A player id and config pair as it appears on the wire.
///
/// The id stays a string until it is applied so that one malformed entry can
/// be skipped without failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub player_id: String,
    pub config: PlayerModelConfig,
}

wire_record!(ModelEntry { player_id, config });

impl ModelEntry {
    /// Upper bound of an encoded entry with a hyphenated id and a valid config
    pub const MAX_ENCODED_LEN: usize = 1 + 36 + PlayerModelConfig::MAX_ENCODED_LEN;

    pub fn new(player_id: Uuid, config: PlayerModelConfig) -> Self {
        Self {
            player_id: player_id.hyphenated().to_string(),
            config,
        }
    }

    /// Parse the player id
    pub fn player_uuid(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.player_id)
    }
}

/// Server to client: full snapshot of every stored config
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncAllModels {
    pub entries: Vec<ModelEntry>,
}

wire_record!(SyncAllModels { entries });

impl Packet for SyncAllModels {
    const OPCODE: u8 = opcode::SYNC_ALL_MODELS;
}

impl ChannelPacket for SyncAllModels {
    const CHANNEL: &'static str = "cottfur:sync_all_models";
}

impl SyncAllModels {
    /// Upper bound of the payload for `players` valid entries
    pub fn max_encoded_len(players: usize) -> usize {
        5 + players * ModelEntry::MAX_ENCODED_LEN
    }
}

impl FromIterator<(Uuid, PlayerModelConfig)> for SyncAllModels {
    fn from_iter<I: IntoIterator<Item = (Uuid, PlayerModelConfig)>>(configs: I) -> Self {
        Self {
            entries: configs
                .into_iter()
                .map(|(id, config)| ModelEntry::new(id, config))
                .collect(),
        }
    }
}

/// Server to client: one player's config changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSingleModel {
    pub entry: ModelEntry,
}

wire_record!(SyncSingleModel { entry });

impl Packet for SyncSingleModel {
    const OPCODE: u8 = opcode::SYNC_SINGLE_MODEL;
}

impl ChannelPacket for SyncSingleModel {
    const CHANNEL: &'static str = "cottfur:sync_single_model";
}

impl SyncSingleModel {
    pub fn new(player_id: Uuid, config: PlayerModelConfig) -> Self {
        Self {
            entry: ModelEntry::new(player_id, config),
        }
    }
}

// ============ Dispatch ============

/// Packets a server can receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundPacket {
    Hello(Hello),
    UpdateModel(UpdateModel),
}

impl ServerboundPacket {
    pub fn decode(frame: &Frame) -> Result<Self, PacketDecodeError> {
        match frame.opcode {
            opcode::HELLO => Ok(Self::Hello(Hello::from_bytes(&frame.payload)?)),
            opcode::UPDATE_MODEL => Ok(Self::UpdateModel(UpdateModel::from_bytes(
                &frame.payload,
            )?)),
            other => Err(unknown_opcode(other)),
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Self::Hello(_) => Hello::OPCODE,
            Self::UpdateModel(_) => UpdateModel::OPCODE,
        }
    }
}

/// Packets a client can receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundPacket {
    Welcome(Welcome),
    Disconnect(Disconnect),
    SyncAllModels(SyncAllModels),
    SyncSingleModel(SyncSingleModel),
}

impl ClientboundPacket {
    pub fn decode(frame: &Frame) -> Result<Self, PacketDecodeError> {
        match frame.opcode {
            opcode::WELCOME => Ok(Self::Welcome(Welcome::from_bytes(&frame.payload)?)),
            opcode::DISCONNECT => Ok(Self::Disconnect(Disconnect::from_bytes(&frame.payload)?)),
            opcode::SYNC_ALL_MODELS => Ok(Self::SyncAllModels(SyncAllModels::from_bytes(
                &frame.payload,
            )?)),
            opcode::SYNC_SINGLE_MODEL => Ok(Self::SyncSingleModel(
                SyncSingleModel::from_bytes(&frame.payload)?,
            )),
            other => Err(unknown_opcode(other)),
        }
    }
}

fn unknown_opcode(opcode: u8) -> PacketDecodeError {
    PacketDecodeError::InvalidValue {
        field: "opcode".to_string(),
        value: format!("{:#04x}", opcode),
    }
}
