//! Torrent file handling module
//!
//! This module provides functionality for parsing .torrent files into
//! descriptors and deriving their info hash.

pub mod parser;
pub mod info;

#[cfg(test)]
pub(crate) mod fixtures;

pub use parser::TorrentParser;
pub use info::{TorrentInfo, TorrentFile, HASH_LEN};
