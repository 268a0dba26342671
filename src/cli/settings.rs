//! Client display settings
//!
//! The user agent and listen port presented to trackers. Both can be
//! changed at runtime; a change replaces the whole settings object.

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, SeederError};
use crate::identity::record::{lenient_port, DEFAULT_PORT};

/// User agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = "qBittorrent 4.3.7";

/// Ports accepted from the operator
pub const VALID_PORTS: RangeInclusive<u16> = 1024..=65535;

/// Identity presented to trackers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_port", deserialize_with = "lenient_port")]
    pub port: u16,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            port: DEFAULT_PORT,
        }
    }
}

impl ClientSettings {
    /// Load settings from a JSON file. Missing or unreadable files give defaults.
    pub async fn load(path: &Path) -> Self {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Using default settings, {} not readable: {}", path.display(), e);
                return Self::default();
            }
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!("Ignoring malformed settings file {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Write settings as pretty JSON, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data).await.map_err(|e| {
            SeederError::persistence_failure_full("Failed to write settings", path.display().to_string(), e.to_string())
        })
    }

    /// Check the values an operator may set
    pub fn validate(&self) -> Result<()> {
        validate_port(self.port)?;
        if self.user_agent.trim().is_empty() {
            return Err(SeederError::config_error_with_field("User agent cannot be empty", "user_agent"));
        }
        Ok(())
    }
}

/// Reject ports outside [`VALID_PORTS`]
pub fn validate_port(port: u16) -> Result<()> {
    if !VALID_PORTS.contains(&port) {
        return Err(SeederError::config_error_with_field(
            format!("Port {} must be between {} and {}", port, VALID_PORTS.start(), VALID_PORTS.end()),
            "port",
        ));
    }
    Ok(())
}

/// Shared handle to the current settings
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<ClientSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Snapshot of the current settings
    pub async fn get(&self) -> ClientSettings {
        self.inner.read().await.clone()
    }

    /// Replace the settings with `update` applied to a copy of the current ones
    pub async fn update<F>(&self, update: F) -> Result<ClientSettings>
    where
        F: FnOnce(&mut ClientSettings),
    {
        let mut guard = self.inner.write().await;
        let mut next = guard.clone();
        update(&mut next);
        next.validate()?;
        *guard = next.clone();
        Ok(next)
    }
}
