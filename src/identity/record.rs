//! Persisted per-torrent announce identity

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

/// Client-version prefix of every generated peer id
pub const PEER_ID_PREFIX: &str = "-DE13F0-";

/// Number of random characters after [`PEER_ID_PREFIX`] and in the session key
pub const RANDOM_ID_LEN: usize = 12;

/// Range for the initial upload counter (30 MiB to 100 MiB)
pub const INITIAL_UPLOADED: RangeInclusive<u64> = 30 * 1024 * 1024..=100 * 1024 * 1024;

/// Port used when a stored record carries none or an unusable one
pub const DEFAULT_PORT: u16 = 6881;

/// Stored identities keyed by hex info hash
pub type IdentityMap = BTreeMap<String, AnnounceIdentity>;

/// Identity a torrent announces under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceIdentity {
    /// 20-character peer id: prefix plus random alphanumerics
    pub peer_id: String,
    /// Port reported to the tracker
    #[serde(default = "default_port", deserialize_with = "lenient_port")]
    pub port: u16,
    /// Session key sent on every announce
    pub key: String,
    /// Upload counter reported to the tracker; never decreases
    pub uploaded: u64,
}

impl AnnounceIdentity {
    /// Generate a fresh identity from `rng`
    pub fn generate<R: Rng>(rng: &mut R, port: u16) -> Self {
        Self {
            peer_id: format!("{}{}", PEER_ID_PREFIX, random_id(rng, RANDOM_ID_LEN)),
            port,
            key: random_id(rng, RANDOM_ID_LEN),
            uploaded: rng.gen_range(INITIAL_UPLOADED),
        }
    }
}

/// Random ASCII alphanumeric string of `len` characters
pub fn random_id<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Older state and settings files may hold ports outside the u16 range
pub(crate) fn lenient_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(u16::try_from(raw).ok().filter(|p| *p != 0).unwrap_or(DEFAULT_PORT))
}
