//! CottFur Model Sync Library
//!
//! This library provides the avatar model synchronization service for CottFur:
//! a per-player model configuration record, a concurrent store of those
//! records, and the protocol that keeps every client's store in line with
//! the server's.
//!
//! ## Modules
//!
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `model` - Model configuration record, store and species registry
//! - `net` - Network handling and session management
//! - `protocol` - Wire codec, packets and handshake
//! - `state` - Shared server state
//! - `sync` - Server and client model sync services

pub mod config;
pub mod error;
pub mod model;
pub mod net;
pub mod protocol;
pub mod state;
pub mod sync;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{CottfurError, Result};
pub use model::{ModelRegistry, ModelType, PlayerModelConfig, PlayerModelStore};
pub use state::AppState;
pub use sync::{ModelSyncClient, ModelSyncServer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
