//! Tracker announce response
//!
//! The body is decoded once and fields are read on demand. Anything the
//! seeder does not use is left alone.

use std::net::Ipv4Addr;

use crate::bencode::{self, BencodeDict, BencodeValue};
use crate::error::{Result, SeederError};
use crate::tracker::compact::{parse_compact_peers, CompactPeer};

/// Decoded announce response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerResponse {
    fields: BencodeDict,
}

impl TrackerResponse {
    /// Decode a response body. Bodies that are not a bencoded dictionary
    /// count as network failures.
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        let value = bencode::decode(body).map_err(|e| {
            SeederError::network_failure("Tracker response is not valid bencode").with_context(e.to_string())
        })?;
        match value {
            BencodeValue::Dict(fields) => Ok(Self { fields }),
            other => Err(SeederError::network_failure(format!(
                "Tracker response is a {}, expected a dictionary",
                other.kind()
            ))),
        }
    }

    /// Raw field access
    pub fn get(&self, key: &str) -> Option<&BencodeValue> {
        self.fields.get(key.as_bytes())
    }

    /// `failure reason`, when the tracker rejected the announce
    pub fn failure_reason(&self) -> Option<String> {
        self.text("failure reason")
    }

    /// `warning message`
    pub fn warning(&self) -> Option<String> {
        self.text("warning message")
    }

    /// Announce interval requested by the tracker, in seconds
    pub fn interval(&self) -> Option<i64> {
        self.get("interval").and_then(BencodeValue::as_int)
    }

    pub fn min_interval(&self) -> Option<i64> {
        self.get("min interval").and_then(BencodeValue::as_int)
    }

    /// Seeders
    pub fn complete(&self) -> Option<i64> {
        self.get("complete").and_then(BencodeValue::as_int)
    }

    /// Leechers
    pub fn incomplete(&self) -> Option<i64> {
        self.get("incomplete").and_then(BencodeValue::as_int)
    }

    /// True when the response carries a `peers` field of any shape
    pub fn has_peers(&self) -> bool {
        self.get("peers").is_some()
    }

    /// Peers in the response. Missing field gives an empty list. Compact
    /// strings and lists of `ip`/`port` dictionaries are both accepted;
    /// list entries that are not IPv4 are skipped.
    pub fn peers(&self) -> Vec<CompactPeer> {
        match self.get("peers") {
            Some(BencodeValue::Bytes(data)) => parse_compact_peers(data),
            Some(BencodeValue::List(entries)) => entries.iter().filter_map(peer_from_dict).collect(),
            _ => Vec::new(),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(BencodeValue::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

fn peer_from_dict(entry: &BencodeValue) -> Option<CompactPeer> {
    let ip: Ipv4Addr = entry.get(b"ip")?.as_str()?.parse().ok()?;
    let port = u16::try_from(entry.get(b"port")?.as_int()?).ok()?;
    Some(CompactPeer { ip, port })
}
