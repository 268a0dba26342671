//! Identity store
//!
//! In-memory view of the identity mapping with write-through persistence.
//! Every mutation reloads the backend, merges, mutates and stores the whole
//! mapping while holding one async lock, so at most one write is in flight.
//! Backend failures never lose in-memory state: a failed load counts as an
//! empty store and a failed store is logged and retried on the next write.
//! Removals not yet persisted are remembered so a reload cannot bring the
//! record back.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, SeederError};
use crate::identity::backend::IdentityBackend;
use crate::identity::record::{AnnounceIdentity, IdentityMap};
use crate::torrent::HASH_LEN;

struct StoreState {
    identities: IdentityMap,
    /// Keys removed in memory whose removal has not been stored yet
    removed: HashSet<String>,
    default_port: u16,
    rng: StdRng,
}

/// One authoritative announce identity per info hash
pub struct IdentityStore {
    backend: Arc<dyn IdentityBackend>,
    state: Mutex<StoreState>,
}

impl IdentityStore {
    /// Open a store with entropy-seeded randomness
    pub async fn open(backend: Arc<dyn IdentityBackend>, default_port: u16) -> Self {
        Self::open_with_rng(backend, default_port, StdRng::from_entropy()).await
    }

    /// Open a store that draws new identities from `rng`
    pub async fn open_with_rng(backend: Arc<dyn IdentityBackend>, default_port: u16, rng: StdRng) -> Self {
        let identities = match backend.load().await {
            Ok(identities) => {
                info!("Loaded {} announce identities from {}", identities.len(), backend.describe());
                identities
            }
            Err(e) => {
                warn!("Could not load announce identities, starting empty: {}", e);
                IdentityMap::new()
            }
        };

        Self {
            backend,
            state: Mutex::new(StoreState {
                identities,
                removed: HashSet::new(),
                default_port,
                rng,
            }),
        }
    }

    /// Storage key for an info hash
    pub fn key_for(info_hash: &[u8; HASH_LEN]) -> String {
        hex::encode(info_hash)
    }

    /// Return the identity for `info_hash`, creating and persisting one on a miss
    pub async fn get_or_create(&self, info_hash: &[u8; HASH_LEN]) -> AnnounceIdentity {
        let key = Self::key_for(info_hash);
        let mut state = self.state.lock().await;

        if let Some(existing) = state.identities.get(&key) {
            return existing.clone();
        }

        self.merge_from_backend(&mut state).await;
        if let Some(existing) = state.identities.get(&key) {
            debug!("Found identity for {} after reloading store", key);
            return existing.clone();
        }

        let port = state.default_port;
        let identity = AnnounceIdentity::generate(&mut state.rng, port);
        info!("Created announce identity {} for {}", identity.peer_id, key);
        state.removed.remove(&key);
        state.identities.insert(key, identity.clone());

        if let Err(e) = self.persist(&mut state).await {
            warn!("New identity kept in memory only: {}", e);
        }
        identity
    }

    /// Identity for `info_hash`, if one exists
    pub async fn get(&self, info_hash: &[u8; HASH_LEN]) -> Option<AnnounceIdentity> {
        self.state.lock().await.identities.get(&Self::key_for(info_hash)).cloned()
    }

    /// Copy of every known identity
    pub async fn snapshot(&self) -> IdentityMap {
        self.state.lock().await.identities.clone()
    }

    /// Persist the whole mapping
    pub async fn save(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.merge_from_backend(&mut state).await;
        self.persist(&mut state).await
    }

    /// Raise the stored upload counter for `info_hash` to `uploaded` and persist.
    /// Lower values are ignored.
    pub async fn record_uploaded(&self, info_hash: &[u8; HASH_LEN], uploaded: u64) -> Result<()> {
        let key = Self::key_for(info_hash);
        let mut state = self.state.lock().await;
        self.merge_from_backend(&mut state).await;

        let identity = state
            .identities
            .get_mut(&key)
            .ok_or_else(|| SeederError::persistence_failure(format!("No identity stored for {}", key)))?;
        identity.uploaded = identity.uploaded.max(uploaded);

        self.persist(&mut state).await
    }

    /// Rewrite the port of every identity and use it for new ones
    pub async fn set_port(&self, port: u16) -> Result<()> {
        let mut state = self.state.lock().await;
        self.merge_from_backend(&mut state).await;

        state.default_port = port;
        for identity in state.identities.values_mut() {
            identity.port = port;
        }
        self.persist(&mut state).await
    }

    /// Delete the identity for `info_hash`. Returns false when none existed.
    pub async fn remove(&self, info_hash: &[u8; HASH_LEN]) -> bool {
        let key = Self::key_for(info_hash);
        let mut state = self.state.lock().await;
        self.merge_from_backend(&mut state).await;

        if state.identities.remove(&key).is_none() {
            return false;
        }
        info!("Removed announce identity for {}", key);
        state.removed.insert(key);
        if let Err(e) = self.persist(&mut state).await {
            warn!("Identity removal not persisted yet: {}", e);
        }
        true
    }

    /// Pull in records written by other processes. Existing in-memory
    /// records win, except that the larger upload counter is kept.
    async fn merge_from_backend(&self, state: &mut StoreState) {
        match self.backend.load().await {
            Ok(stored) => {
                for (key, record) in stored {
                    if state.removed.contains(&key) {
                        continue;
                    }
                    match state.identities.get_mut(&key) {
                        Some(current) => current.uploaded = current.uploaded.max(record.uploaded),
                        None => {
                            state.identities.insert(key, record);
                        }
                    }
                }
            }
            Err(e) => debug!("Reload of identity store skipped: {}", e),
        }
    }

    async fn persist(&self, state: &mut StoreState) -> Result<()> {
        match self.backend.store(&state.identities).await {
            Ok(()) => {
                state.removed.clear();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to persist announce identities to {}: {}", self.backend.describe(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::backend::MemoryBackend;

    async fn store_with(backend: Arc<MemoryBackend>) -> IdentityStore {
        IdentityStore::open_with_rng(backend, 6881, StdRng::seed_from_u64(1)).await
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;

        let first = store.get_or_create(&[1u8; 20]).await;
        let second = store.get_or_create(&[1u8; 20]).await;

        assert_eq!(first, second);
        assert_eq!(backend.write_count(), 1);
        assert!(backend.contents().contains_key(&"01".repeat(20)));
    }

    #[tokio::test]
    async fn test_distinct_hashes_get_distinct_identities() {
        let store = store_with(Arc::new(MemoryBackend::new())).await;
        let a = store.get_or_create(&[1u8; 20]).await;
        let b = store.get_or_create(&[2u8; 20]).await;
        assert_ne!(a.peer_id, b.peer_id);
        assert_ne!(a.key, b.key);
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_identity_survives_restart() {
        let backend = Arc::new(MemoryBackend::new());
        let created = store_with(backend.clone()).await.get_or_create(&[9u8; 20]).await;

        // A different seed would generate a different identity on a miss
        let reopened = IdentityStore::open_with_rng(backend, 6881, StdRng::seed_from_u64(99)).await;
        assert_eq!(reopened.get_or_create(&[9u8; 20]).await, created);
    }

    #[tokio::test]
    async fn test_load_failure_is_empty_store() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_failing(true);
        let store = store_with(backend.clone()).await;
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_memory() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;

        backend.set_failing(true);
        let created = store.get_or_create(&[3u8; 20]).await;
        assert_eq!(backend.write_count(), 0);
        assert_eq!(store.get_or_create(&[3u8; 20]).await, created);

        backend.set_failing(false);
        store.save().await.unwrap();
        assert_eq!(backend.contents().get(&"03".repeat(20)), Some(&created));
    }

    #[tokio::test]
    async fn test_record_uploaded_never_decreases() {
        let store = store_with(Arc::new(MemoryBackend::new())).await;
        let created = store.get_or_create(&[4u8; 20]).await;

        store.record_uploaded(&[4u8; 20], created.uploaded + 100).await.unwrap();
        store.record_uploaded(&[4u8; 20], 1).await.unwrap();

        assert_eq!(store.get(&[4u8; 20]).await.unwrap().uploaded, created.uploaded + 100);
        assert!(store.record_uploaded(&[5u8; 20], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_set_port_rewrites_all() {
        let store = store_with(Arc::new(MemoryBackend::new())).await;
        store.get_or_create(&[1u8; 20]).await;
        store.get_or_create(&[2u8; 20]).await;

        store.set_port(51413).await.unwrap();

        assert!(store.snapshot().await.values().all(|i| i.port == 51413));
        assert_eq!(store.get_or_create(&[3u8; 20]).await.port, 51413);
    }

    #[tokio::test]
    async fn test_remove() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;
        store.get_or_create(&[6u8; 20]).await;

        assert!(store.remove(&[6u8; 20]).await);
        assert!(!store.remove(&[6u8; 20]).await);
        assert!(backend.contents().is_empty());
    }

    #[tokio::test]
    async fn test_failed_removal_is_not_undone_by_reload() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;
        store.get_or_create(&[7u8; 20]).await;
        store.get_or_create(&[8u8; 20]).await;

        backend.set_failing(true);
        assert!(store.remove(&[7u8; 20]).await);
        assert!(backend.contents().contains_key(&"07".repeat(20)));

        // The next write merges the stale backend copy and retries the removal
        backend.set_failing(false);
        store.record_uploaded(&[8u8; 20], u64::MAX).await.unwrap();

        assert!(store.get(&[7u8; 20]).await.is_none());
        assert!(!backend.contents().contains_key(&"07".repeat(20)));
        assert_eq!(backend.contents()[&"08".repeat(20)].uploaded, u64::MAX);
    }

    #[tokio::test]
    async fn test_recreate_after_failed_removal() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;
        let original = store.get_or_create(&[7u8; 20]).await;

        backend.set_failing(true);
        store.remove(&[7u8; 20]).await;
        backend.set_failing(false);

        let recreated = store.get_or_create(&[7u8; 20]).await;
        assert_ne!(recreated.peer_id, original.peer_id);
        assert_eq!(backend.contents()[&"07".repeat(20)], recreated);
    }

    #[tokio::test]
    async fn test_merges_records_from_other_writers() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;
        let mine = store.get_or_create(&[1u8; 20]).await;

        // Another process adds a record and bumps our counter
        let mut external = backend.contents();
        external.insert("02".repeat(20), AnnounceIdentity::generate(&mut StdRng::seed_from_u64(5), 6881));
        external.get_mut(&"01".repeat(20)).unwrap().uploaded = mine.uploaded + 10;
        backend.store(&external).await.unwrap();

        store.save().await.unwrap();
        let merged = backend.contents();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&"01".repeat(20)].uploaded, mine.uploaded + 10);
        assert_eq!(merged[&"01".repeat(20)].peer_id, mine.peer_id);
    }
}
