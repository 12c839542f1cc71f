//! Player model store
//!
//! Concurrent map from player id to [`PlayerModelConfig`]. One instance is
//! owned by the server state and one by each client session; they converge
//! only through the sync protocol.
//!
//! The store is total over player ids: a lookup with no entry returns the
//! default config. Entries are replaced wholesale, never merged.

use std::collections::HashMap;

use dashmap::DashMap;
use uuid::Uuid;

use crate::model::player_config::PlayerModelConfig;

/// Thread-safe player model store
///
/// Backed by a sharded map so the render path reading configs never waits on a
/// lock held across network I/O. Each operation touches a single shard.
#[derive(Debug, Default)]
pub struct PlayerModelStore {
    configs: DashMap<Uuid, PlayerModelConfig>,
    default_config: PlayerModelConfig,
}

impl PlayerModelStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a player's config, or the default config if none is stored
    pub fn get(&self, player_id: &Uuid) -> PlayerModelConfig {
        self.configs
            .get(player_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.default_config.clone())
    }

    /// Get a player's config only if one was explicitly stored
    pub fn get_explicit(&self, player_id: &Uuid) -> Option<PlayerModelConfig> {
        self.configs.get(player_id).map(|entry| entry.value().clone())
    }

    /// Store a player's config, replacing any previous one
    pub fn set(&self, player_id: Uuid, config: PlayerModelConfig) {
        self.configs.insert(player_id, config);
    }

    /// Remove a player's config, returning it if present
    pub fn remove(&self, player_id: &Uuid) -> Option<PlayerModelConfig> {
        self.configs.remove(player_id).map(|(_, config)| config)
    }

    /// Whether the player has an explicit config selecting an anthro model
    pub fn has_anthro_model(&self, player_id: &Uuid) -> bool {
        self.configs
            .get(player_id)
            .map(|entry| entry.is_anthro_model())
            .unwrap_or(false)
    }

    /// Copy of all explicit entries at this point in time
    pub fn snapshot(&self) -> HashMap<Uuid, PlayerModelConfig> {
        self.configs
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.configs.clear();
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// The config returned for players without an entry
    pub fn default_config(&self) -> &PlayerModelConfig {
        &self.default_config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn custom() -> PlayerModelConfig {
        PlayerModelConfig::new("protogen")
            .with_colors(0x112233, 0x445566, 0x778899)
            .with_pattern("stripes")
    }

    #[test]
    fn test_unset_returns_default() {
        let store = PlayerModelStore::new();
        for _ in 0..10 {
            assert_eq!(store.get(&Uuid::new_v4()), PlayerModelConfig::default());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let store = PlayerModelStore::new();
        let id = Uuid::new_v4();

        store.set(id, custom());

        assert_eq!(store.get(&id), custom());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces_whole_record() {
        let store = PlayerModelStore::new();
        let id = Uuid::new_v4();
        let second = PlayerModelConfig::new("k9");

        store.set(id, custom());
        store.set(id, second.clone());

        // No field of the first record survives
        assert_eq!(store.get(&id), second);
        assert_eq!(store.get(&id).pattern_id, None);
    }

    #[test]
    fn test_remove_reverts_to_default() {
        let store = PlayerModelStore::new();
        let id = Uuid::new_v4();

        store.set(id, custom());
        assert_eq!(store.remove(&id), Some(custom()));

        assert_eq!(store.get(&id), PlayerModelConfig::default());
        assert_eq!(store.get_explicit(&id), None);

        // Removing again is a no-op
        assert_eq!(store.remove(&id), None);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = PlayerModelStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.set(a, custom());

        let snapshot = store.snapshot();

        store.set(a, PlayerModelConfig::new("feline"));
        store.set(b, custom());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&a), Some(&custom()));
    }

    #[test]
    fn test_clear() {
        let store = PlayerModelStore::new();
        store.set(Uuid::new_v4(), custom());
        store.set(Uuid::new_v4(), custom());

        store.clear();

        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_has_anthro_model() {
        let store = PlayerModelStore::new();
        let anthro = Uuid::new_v4();
        let plain = Uuid::new_v4();
        let unknown = Uuid::new_v4();

        store.set(anthro, custom());
        store.set(plain, PlayerModelConfig::default());

        assert!(store.has_anthro_model(&anthro));
        assert!(!store.has_anthro_model(&plain));
        assert!(!store.has_anthro_model(&unknown));
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let store = Arc::new(PlayerModelStore::new());
        let id = Uuid::new_v4();
        let first = PlayerModelConfig::new("k9").with_colors(1, 1, 1);
        let second = PlayerModelConfig::new("feline")
            .with_colors(2, 2, 2)
            .with_pattern("tabby");

        let writers: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|config| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        store.set(id, config.clone());
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            let (first, second) = (first.clone(), second.clone());
            thread::spawn(move || {
                for _ in 0..1000 {
                    let seen = store.get(&id);
                    assert!(
                        seen == first || seen == second || seen == PlayerModelConfig::default()
                    );
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let last = store.get(&id);
        assert!(last == first || last == second);
    }
}
