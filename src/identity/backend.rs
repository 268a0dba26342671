//! Persistence backends for announce identities
//!
//! The store only needs to load and replace the whole mapping, so any
//! durable medium can sit behind [`IdentityBackend`]: a local JSON file,
//! a document store, or plain memory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, trace};

use crate::error::{Result, SeederError};
use crate::identity::record::IdentityMap;

/// Durable storage for the identity mapping
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Load the full mapping
    async fn load(&self) -> Result<IdentityMap>;

    /// Replace the full mapping
    async fn store(&self, identities: &IdentityMap) -> Result<()>;

    /// Human-readable location, for log messages
    fn describe(&self) -> String;
}

/// Mapping kept as a pretty-printed JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn failure(&self, message: &str, err: impl ToString) -> SeederError {
        SeederError::persistence_failure_full(message, self.path.display().to_string(), err.to_string())
    }
}

#[async_trait]
impl IdentityBackend for JsonFileBackend {
    async fn load(&self) -> Result<IdentityMap> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("No identity file at {}", self.path.display());
            return Ok(IdentityMap::new());
        }

        let data = fs::read(&self.path)
            .await
            .map_err(|e| self.failure("Failed to read identity file", e))?;
        let identities: IdentityMap = serde_json::from_slice(&data)
            .map_err(|e| self.failure("Failed to parse identity file", e))?;
        trace!("Loaded {} identities from {}", identities.len(), self.path.display());
        Ok(identities)
    }

    async fn store(&self, identities: &IdentityMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.failure("Failed to create identity directory", e))?;
            }
        }

        let data = serde_json::to_vec_pretty(identities)
            .map_err(|e| self.failure("Failed to serialize identities", e))?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .await
            .map_err(|e| self.failure("Failed to write identity file", e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.failure("Failed to replace identity file", e))?;

        trace!("Stored {} identities to {}", identities.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process backend for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<IdentityMap>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: IdentityMap) -> Self {
        Self {
            data: Mutex::new(identities),
            ..Self::default()
        }
    }

    /// Make every subsequent load and store fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful stores so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of what has been stored
    pub fn contents(&self) -> IdentityMap {
        self.data.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SeederError::persistence_failure("Memory backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityBackend for MemoryBackend {
    async fn load(&self) -> Result<IdentityMap> {
        self.check()?;
        Ok(self.contents())
    }

    async fn store(&self, identities: &IdentityMap) -> Result<()> {
        self.check()?;
        let mut data = self
            .data
            .lock()
            .map_err(|_| SeederError::persistence_failure("Memory backend lock poisoned"))?;
        *data = identities.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
