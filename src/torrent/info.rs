//! Torrent information structures
//!
//! Provides the immutable descriptor derived from a .torrent file.

use std::fmt;

use chrono::{Local, TimeZone};
use sha1::{Digest, Sha1};

use crate::cli::display::format_bytes;
use crate::error::{Result, SeederError};

/// Length of a SHA1 digest, used both for piece hashes and the info hash
pub const HASH_LEN: usize = 20;

/// Represents a file in a multi-file torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    /// File path components (e.g., ["folder", "subfolder", "file.txt"])
    pub path: Vec<String>,
    /// File size in bytes
    pub length: u64,
}

/// High-level torrent information
#[derive(Debug, Clone)]
pub struct TorrentInfo {
    /// Tracker announce URL
    pub announce: String,
    /// SHA1 hash of the canonically encoded info dictionary
    pub info_hash: [u8; HASH_LEN],
    /// Size of each piece in bytes
    pub piece_length: u64,
    /// List of piece hashes (each is a 20-byte SHA1 hash)
    pub pieces: Vec<[u8; HASH_LEN]>,
    /// Torrent name
    pub name: String,
    /// Single file size (None for multi-file torrents)
    pub length: Option<u64>,
    /// Files in multi-file torrents (None for single-file torrents)
    pub files: Option<Vec<TorrentFile>>,
    /// Unix timestamp from `creation date`
    pub creation_date: Option<i64>,
    pub created_by: Option<String>,
    pub encoding: Option<String>,
}

impl TorrentInfo {
    /// Calculate total size of all files in torrent
    pub fn total_size(&self) -> u64 {
        if let Some(files) = &self.files {
            files.iter().fold(0u64, |total, f| total.saturating_add(f.length))
        } else {
            self.length.unwrap_or(0)
        }
    }

    /// Get number of pieces in torrent
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Check if this is a multi-file torrent
    pub fn is_multi_file(&self) -> bool {
        self.files.is_some()
    }

    /// Get info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// Generate info hash from encoded info dictionary bytes
    pub fn generate_info_hash(info_dict_bytes: &[u8]) -> [u8; HASH_LEN] {
        let mut hasher = Sha1::new();
        hasher.update(info_dict_bytes);
        hasher.finalize().into()
    }

    /// Parse piece hashes from concatenated bytes in torrent file
    pub fn parse_piece_hashes(pieces_bytes: &[u8]) -> Result<Vec<[u8; HASH_LEN]>> {
        if pieces_bytes.len() % HASH_LEN != 0 {
            return Err(SeederError::invalid_metadata_with_field(
                format!(
                    "Pieces field length must be a multiple of {}, got {}",
                    HASH_LEN,
                    pieces_bytes.len()
                ),
                "pieces",
            ));
        }

        Ok(pieces_bytes
            .chunks_exact(HASH_LEN)
            .map(|chunk| {
                let mut hash = [0u8; HASH_LEN];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }

    /// Creation date rendered in local time
    pub fn creation_date_display(&self) -> Option<String> {
        let timestamp = self.creation_date?;
        Local
            .timestamp_opt(timestamp, 0)
            .single()
            .map(|dt| dt.format("%Y/%m/%d %H:%M:%S").to_string())
    }
}

impl fmt::Display for TorrentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Announce: {}", self.announce)?;
        if let Some(date) = self.creation_date_display() {
            writeln!(f, "Date: {}", date)?;
        }
        if let Some(created_by) = &self.created_by {
            writeln!(f, "Created by: {}", created_by)?;
        }
        if let Some(encoding) = &self.encoding {
            writeln!(f, "Encoding: {}", encoding)?;
        }
        writeln!(f, "Piece len: {}", format_bytes(self.piece_length))?;
        writeln!(f, "Pieces: {}", self.piece_count())?;
        writeln!(f, "Name: {}", self.name)?;
        write!(f, "Total Size: {}", format_bytes(self.total_size()))
    }
}
