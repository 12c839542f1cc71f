//! Model module
//!
//! The avatar data model shared by server and client:
//! - Per-player model configuration record
//! - Concurrent per-process store of those records
//! - Species registry and resource-name derivation
//! - Fur patterns and color helpers

pub mod pattern;
pub mod player_config;
pub mod species;
pub mod store;

pub use pattern::PatternType;
pub use player_config::PlayerModelConfig;
pub use species::{ModelRegistry, ModelType, SpeciesDescriptor};
pub use store::PlayerModelStore;
