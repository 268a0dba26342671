//! Announce request parameters and URL construction

use std::fmt::Write;

use crate::torrent::HASH_LEN;

/// `numwant` sent with the initial announce
pub const STARTED_NUMWANT: u32 = 200;

/// Announce event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    /// First announce after a torrent is loaded
    Started,
    /// Periodic announce; no `event` parameter is sent
    Regular,
}

impl AnnounceEvent {
    fn as_param(self) -> Option<&'static str> {
        match self {
            AnnounceEvent::Started => Some("started"),
            AnnounceEvent::Regular => None,
        }
    }
}

/// One announce to a tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub info_hash: [u8; HASH_LEN],
    pub peer_id: String,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub event: AnnounceEvent,
    pub key: String,
    pub numwant: u32,
}

impl AnnounceRequest {
    /// Initial announce: asks for peers
    pub fn started(info_hash: [u8; HASH_LEN], peer_id: &str, key: &str, port: u16, uploaded: u64, total_size: u64) -> Self {
        Self {
            info_hash,
            peer_id: peer_id.to_string(),
            port,
            uploaded,
            downloaded: total_size,
            left: 0,
            event: AnnounceEvent::Started,
            key: key.to_string(),
            numwant: STARTED_NUMWANT,
        }
    }

    /// Periodic announce: reports counters, wants no peers
    pub fn regular(info_hash: [u8; HASH_LEN], peer_id: &str, key: &str, port: u16, uploaded: u64, total_size: u64) -> Self {
        Self {
            event: AnnounceEvent::Regular,
            numwant: 0,
            ..Self::started(info_hash, peer_id, key, port, uploaded, total_size)
        }
    }

    /// Query string, raw bytes percent-encoded, in the order real clients send it
    pub fn query_string(&self) -> String {
        let mut query = String::with_capacity(256);
        let _ = write!(
            query,
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}",
            urlencoding::encode_binary(&self.info_hash),
            urlencoding::encode_binary(self.peer_id.as_bytes()),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left,
        );
        if let Some(event) = self.event.as_param() {
            let _ = write!(query, "&event={}", event);
        }
        let _ = write!(
            query,
            "&key={}&compact=1&numwant={}&supportcrypto=1&no_peer_id=1",
            urlencoding::encode(&self.key),
            self.numwant,
        );
        query
    }

    /// Full announce URL for `announce`
    pub fn url(&self, announce: &str) -> String {
        let separator = if announce.contains('?') { '&' } else { '?' };
        format!("{}{}{}", announce, separator, self.query_string())
    }
}
