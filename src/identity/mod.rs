//! Announce identity module
//!
//! Keeps one persisted announce identity (peer id, key, port, upload
//! counter) per info hash, so a torrent looks like the same client across
//! restarts.

pub mod record;
pub mod backend;
pub mod store;

pub use record::{AnnounceIdentity, IdentityMap, PEER_ID_PREFIX};
pub use backend::{IdentityBackend, JsonFileBackend, MemoryBackend};
pub use store::IdentityStore;
