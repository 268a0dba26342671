//! Torrent file parser
//!
//! Handles parsing of .torrent files and extracting metadata.

use std::path::Path;

use tracing::{debug, error, info, trace};
use url::Url;

use crate::bencode::{self, BencodeDict, BencodeValue};
use crate::error::{Result, SeederError};
use crate::torrent::info::{TorrentFile, TorrentInfo, HASH_LEN};

/// Parser for .torrent files
pub struct TorrentParser;

impl TorrentParser {
    /// Parse a .torrent file from bytes
    pub fn parse_bytes(data: &[u8]) -> Result<TorrentInfo> {
        debug!("Parsing torrent file from {} bytes", data.len());
        trace!("Torrent data (first 100 bytes): {:?}", &data[..data.len().min(100)]);

        let root = Self::decode_root(data)?;
        Self::convert_to_torrent_info(&root)
    }

    /// Parse a .torrent file from a file path
    pub fn parse_file(path: &Path) -> Result<TorrentInfo> {
        info!("Loading torrent file from: {}", path.display());
        let data = Self::read_file(path)?;
        Self::parse_bytes(&data)
            .map_err(|e| e.with_context(path.display().to_string()))
    }

    /// Info hash of raw torrent bytes, without building a full descriptor
    pub fn content_identity(data: &[u8]) -> Result<[u8; HASH_LEN]> {
        let root = Self::decode_root(data)?;
        let info = root
            .get(b"info".as_slice())
            .ok_or_else(|| SeederError::invalid_metadata_with_field("Missing info dictionary", "info"))?;
        Self::info_hash(info)
    }

    /// Info hash of a .torrent file on disk
    pub fn content_identity_of_file(path: &Path) -> Result<[u8; HASH_LEN]> {
        let data = Self::read_file(path)?;
        Self::content_identity(&data)
    }

    fn read_file(path: &Path) -> Result<Vec<u8>> {
        let data = std::fs::read(path).map_err(|e| {
            error!("Failed to read torrent file '{}': {}", path.display(), e);
            SeederError::persistence_failure_full("Failed to read torrent file", path.display().to_string(), e.to_string())
        })?;
        debug!("Read {} bytes from torrent file", data.len());
        Ok(data)
    }

    fn decode_root(data: &[u8]) -> Result<BencodeDict> {
        match bencode::decode(data) {
            Ok(BencodeValue::Dict(d)) => Ok(d),
            Ok(other) => Err(SeederError::invalid_metadata(format!(
                "Root must be a dictionary, found {}",
                other.kind()
            ))),
            Err(e) => Err(SeederError::invalid_metadata(format!("Failed to decode torrent: {}", e))),
        }
    }

    /// SHA1 over the canonical encoding of the info dictionary
    fn info_hash(info: &BencodeValue) -> Result<[u8; HASH_LEN]> {
        if info.as_dict().is_none() {
            return Err(SeederError::invalid_metadata_with_field("Info must be a dictionary", "info"));
        }
        Ok(TorrentInfo::generate_info_hash(&bencode::encode(info)))
    }

    fn convert_to_torrent_info(root_dict: &BencodeDict) -> Result<TorrentInfo> {
        let announce = required_str(root_dict, "announce")?;
        let url = Url::parse(&announce)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SeederError::invalid_metadata_with_field(
                format!("Unsupported tracker protocol '{}'", url.scheme()),
                "announce",
            ));
        }

        let info_value = root_dict
            .get(b"info".as_slice())
            .ok_or_else(|| SeederError::invalid_metadata_with_field("Missing info dictionary", "info"))?;
        let info_hash = Self::info_hash(info_value)?;
        let info_dict = info_value
            .as_dict()
            .ok_or_else(|| SeederError::invalid_metadata_with_field("Info must be a dictionary", "info"))?;

        let name = required_str(info_dict, "name")?;
        let piece_length = required_size(info_dict, "piece length")?;
        if piece_length == 0 {
            return Err(SeederError::invalid_metadata_with_field("Piece length must be positive", "piece length"));
        }

        let pieces_bytes = info_dict
            .get(b"pieces".as_slice())
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| SeederError::invalid_metadata_with_field("Missing pieces field", "pieces"))?;
        let pieces = TorrentInfo::parse_piece_hashes(pieces_bytes)?;

        let (length, files) = if let Some(file_list) = info_dict.get(b"files".as_slice()) {
            (None, Some(Self::parse_files(file_list)?))
        } else if info_dict.contains_key(b"length".as_slice()) {
            (Some(required_size(info_dict, "length")?), None)
        } else {
            return Err(SeederError::invalid_metadata_with_field(
                "Neither length nor files found in info dict",
                "length",
            ));
        };

        let torrent = TorrentInfo {
            announce,
            info_hash,
            piece_length,
            pieces,
            name,
            length,
            files,
            creation_date: root_dict.get(b"creation date".as_slice()).and_then(|v| v.as_int()),
            created_by: optional_str(root_dict, "created by"),
            encoding: optional_str(root_dict, "encoding"),
        };

        info!("Parsed torrent '{}' ({})", torrent.name, torrent.info_hash_hex());
        Ok(torrent)
    }

    fn parse_files(file_list: &BencodeValue) -> Result<Vec<TorrentFile>> {
        let entries = file_list
            .as_list()
            .ok_or_else(|| SeederError::invalid_metadata_with_field("Files must be a list", "files"))?;

        let files = entries
            .iter()
            .map(|entry| {
                let file_dict = entry
                    .as_dict()
                    .ok_or_else(|| SeederError::invalid_metadata_with_field("File entry must be a dictionary", "files"))?;
                let length = required_size(file_dict, "length")?;
                let path = file_dict
                    .get(b"path".as_slice())
                    .and_then(|v| v.as_list())
                    .map(|parts| {
                        parts
                            .iter()
                            .filter_map(|p| p.as_bytes())
                            .map(|b| String::from_utf8_lossy(b).to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(TorrentFile { path, length })
            })
            .collect::<Result<Vec<_>>>()?;

        files.iter().try_fold(0u64, |total, f| total.checked_add(f.length)).ok_or_else(|| {
            SeederError::invalid_metadata_with_field("Total size of files overflows 64 bits", "files")
        })?;
        Ok(files)
    }
}

fn required_str(dict: &BencodeDict, key: &str) -> Result<String> {
    dict.get(key.as_bytes())
        .and_then(|v| v.as_bytes())
        .map(|b| String::from_utf8_lossy(b).to_string())
        .ok_or_else(|| SeederError::invalid_metadata_with_field(format!("Missing {} field", key), key))
}

fn optional_str(dict: &BencodeDict, key: &str) -> Option<String> {
    dict.get(key.as_bytes())
        .and_then(|v| v.as_bytes())
        .map(|b| String::from_utf8_lossy(b).to_string())
}

fn required_size(dict: &BencodeDict, key: &str) -> Result<u64> {
    let value = dict
        .get(key.as_bytes())
        .and_then(|v| v.as_int())
        .ok_or_else(|| SeederError::invalid_metadata_with_field(format!("Missing {} field", key), key))?;
    u64::try_from(value)
        .map_err(|_| SeederError::invalid_metadata_with_field(format!("Negative {}: {}", key, value), key))
}
