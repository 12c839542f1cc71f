//! Model synchronization
//!
//! Server side: accept a player's config, store it and fan it out to every
//! other connected client. Client side: push the local player's config and
//! reconcile incoming syncs into the local store.

pub mod client;
pub mod server;

pub use client::ModelSyncClient;
pub use server::ModelSyncServer;

use tracing::{debug, warn};

use crate::model::PlayerModelStore;
use crate::protocol::packets::{ModelEntry, SyncAllModels, SyncSingleModel};

/// Apply one entry; malformed player ids are skipped with a warning
fn apply_entry(store: &PlayerModelStore, entry: &ModelEntry) -> bool {
    match entry.player_uuid() {
        Ok(player_id) => {
            store.set(player_id, entry.config.clone());
            true
        }
        Err(e) => {
            warn!(
                player_id = %entry.player_id,
                error = %e,
                "Ignoring model sync entry with malformed player id"
            );
            false
        }
    }
}

/// Overwrite one player's entry. Returns false if the entry was skipped.
pub fn apply_single_sync(store: &PlayerModelStore, packet: &SyncSingleModel) -> bool {
    let applied = apply_entry(store, &packet.entry);
    if applied {
        debug!(
            player_id = %packet.entry.player_id,
            model_type = %packet.entry.config.model_type_id,
            "Applied single model sync"
        );
    }
    applied
}

/// Replace the whole store with the snapshot. Returns the number of entries
/// applied; malformed entries are skipped and the rest still land.
pub fn apply_bulk_sync(store: &PlayerModelStore, packet: &SyncAllModels) -> usize {
    store.clear();

    let applied = packet
        .entries
        .iter()
        .filter(|entry| apply_entry(store, entry))
        .count();

    debug!(
        received = packet.entries.len(),
        applied = applied,
        "Applied bulk model sync"
    );
    applied
}
