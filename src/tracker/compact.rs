//! Compact peer list decoding (4 bytes IPv4 + 2 bytes big-endian port)

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Bytes per compact peer entry
pub const COMPACT_PEER_LEN: usize = 6;

/// Peer address announced by a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactPeer {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl CompactPeer {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for CompactPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Decode a compact peer list. A trailing partial entry is dropped, as
/// trackers in the wild sometimes send one.
pub fn parse_compact_peers(data: &[u8]) -> Vec<CompactPeer> {
    data.chunks_exact(COMPACT_PEER_LEN)
        .map(|chunk| CompactPeer {
            ip: Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]),
            port: u16::from_be_bytes([chunk[4], chunk[5]]),
        })
        .collect()
}
