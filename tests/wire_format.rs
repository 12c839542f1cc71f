//! Wire format tests
//!
//! Checks the byte layout of the sync payloads as another implementation
//! would see them, and decoding of hand-built payloads.

use pretty_assertions::assert_eq;
use tokio_test::assert_ok;
use uuid::Uuid;

use cottfur_sync::model::{PlayerModelConfig, PlayerModelStore};
use cottfur_sync::net::buffer::PacketBuffer;
use cottfur_sync::protocol::codec::WireCodec;
use cottfur_sync::protocol::packets::{SyncAllModels, SyncSingleModel};
use cottfur_sync::sync::apply_bulk_sync;

fn write_entry(buf: &mut PacketBuffer, id: &str, species: &str, texture: Option<&str>) {
    buf.write_string(id);
    buf.write_string(species);
    buf.write_bool(texture.is_some());
    if let Some(texture) = texture {
        buf.write_string(texture);
    }
    buf.write_int(0x224466);
    buf.write_int(0x888888);
    buf.write_int(0xFF0000);
    buf.write_bool(false);
}

#[test]
fn test_single_sync_layout() {
    let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
    let packet = SyncSingleModel::new(id, PlayerModelConfig::new("k9").with_primary_color(0x224466));

    let mut expected = PacketBuffer::new();
    write_entry(
        &mut expected,
        "00000000-0000-0000-0000-000000000001",
        "k9",
        None,
    );

    assert_eq!(packet.to_bytes(), expected.as_bytes().to_vec());
}

#[test]
fn test_hand_built_bulk_sync_with_malformed_entry() {
    let good = Uuid::new_v4();
    let mut buf = PacketBuffer::new();
    buf.write_var_int(2);
    write_entry(&mut buf, &good.to_string(), "feline", Some("skins/cat.png"));
    write_entry(&mut buf, "xyz", "k9", None);

    let packet = assert_ok!(SyncAllModels::from_bytes(buf.as_bytes()));
    assert_eq!(packet.entries.len(), 2);

    let store = PlayerModelStore::new();
    assert_eq!(apply_bulk_sync(&store, &packet), 1);

    let config = store.get(&good);
    assert_eq!(config.model_type_id, "feline");
    assert_eq!(config.custom_texture_id.as_deref(), Some("skins/cat.png"));
    assert_eq!(config.primary_color, 0x224466);
}

#[test]
fn test_truncated_payload_is_rejected() {
    let packet = SyncSingleModel::new(Uuid::new_v4(), PlayerModelConfig::new("protogen"));
    let bytes = packet.to_bytes();

    assert!(SyncSingleModel::from_bytes(&bytes[..bytes.len() - 1]).is_err());

    let mut padded = bytes.clone();
    padded.push(0);
    assert!(SyncSingleModel::from_bytes(&padded).is_err());
}
