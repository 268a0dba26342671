//! rust-torrent-seeder
//!
//! Keeps a directory of torrents announced to their HTTP trackers as fully
//! seeded, with a stable per-torrent identity and a growing upload counter.

pub mod bencode;
pub mod torrent;
pub mod identity;
pub mod tracker;
pub mod seeder;
pub mod cli;
pub mod error;

pub use error::{Result, SeederError};

pub use bencode::{BencodeDict, BencodeValue};
pub use torrent::{TorrentParser, TorrentInfo, TorrentFile};
pub use identity::{AnnounceIdentity, IdentityBackend, IdentityStore, JsonFileBackend, MemoryBackend};
pub use tracker::{
    AnnounceContext, Announcer, AnnouncerStatus, Clock, CompactPeer, HttpTransport,
    SystemClock, TrackerResponse, TrackerTransport, parse_compact_peers,
};
pub use seeder::{ActivityEntry, ActivityLog, ResourceSummary, SeederManager};
pub use cli::{CliArgs, ClientSettings, Config, SettingsHandle};
