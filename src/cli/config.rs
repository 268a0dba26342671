//! CLI configuration module
//!
//! Runtime configuration assembled from CLI arguments.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::args::CliArgs;
use crate::cli::settings::{validate_port, ClientSettings};
use crate::error::{Result, SeederError};

/// Longest tracker timeout accepted
const MAX_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the seeder
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for .torrent files
    pub torrent_dir: PathBuf,
    /// Announce identity file
    pub state_file: PathBuf,
    /// Display settings file
    pub settings_file: PathBuf,
    /// User agent override from the command line
    pub user_agent: Option<String>,
    /// Port override from the command line
    pub port: Option<u16>,
    /// Interval between scheduling passes
    pub tick_interval: Duration,
    /// Tracker request timeout
    pub request_timeout: Duration,
    /// Largest upload increase per periodic announce
    pub upload_step_max: u64,
    /// Seed for randomness (None draws from the OS)
    pub seed: Option<u64>,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        let torrent_dir = args.torrent_dir.clone();
        let state_file = args
            .state_file
            .clone()
            .unwrap_or_else(|| torrent_dir.join("peer_data.json"));
        let settings_file = args
            .settings_file
            .clone()
            .unwrap_or_else(|| torrent_dir.join("config.json"));

        Self {
            torrent_dir,
            state_file,
            settings_file,
            user_agent: args.user_agent.clone(),
            port: args.port,
            tick_interval: Duration::from_secs(args.tick_secs),
            request_timeout: Duration::from_secs(args.timeout_secs),
            upload_step_max: args.upload_step_max,
            seed: args.seed,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(SeederError::config_error_with_field("Tick interval must be at least 1 second", "tick_secs"));
        }

        if self.request_timeout.is_zero() || self.request_timeout > MAX_TIMEOUT {
            return Err(SeederError::config_error_with_field(
                format!("Timeout must be between 1 and {} seconds", MAX_TIMEOUT.as_secs()),
                "timeout_secs",
            ));
        }

        if let Some(port) = self.port {
            validate_port(port)?;
        }

        if self.torrent_dir.as_os_str().is_empty() {
            return Err(SeederError::config_error_with_field("torrent_dir cannot be empty", "torrent_dir"));
        }

        Ok(())
    }

    /// Apply command-line overrides on top of persisted settings
    pub fn apply_overrides(&self, mut settings: ClientSettings) -> ClientSettings {
        if let Some(user_agent) = &self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config_from(argv: &[&str]) -> Config {
        let mut full = vec!["rust-torrent-seeder"];
        full.extend_from_slice(argv);
        Config::from_args(&CliArgs::try_parse_from(full).unwrap())
    }

    #[test]
    fn test_config_from_args() {
        let config = config_from(&["--torrent-dir", "/srv/t", "--tick-secs", "10"]);

        assert_eq!(config.torrent_dir, PathBuf::from("/srv/t"));
        assert_eq!(config.state_file, PathBuf::from("/srv/t/peer_data.json"));
        assert_eq!(config.settings_file, PathBuf::from("/srv/t/config.json"));
        assert_eq!(config.tick_interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_state_file() {
        let config = config_from(&["--state-file", "/var/lib/seeder/ids.json"]);
        assert_eq!(config.state_file, PathBuf::from("/var/lib/seeder/ids.json"));
    }

    #[test]
    fn test_config_validate_rejects() {
        assert!(config_from(&["--tick-secs", "0"]).validate().is_err());
        assert!(config_from(&["--timeout-secs", "0"]).validate().is_err());
        assert!(config_from(&["--timeout-secs", "301"]).validate().is_err());
        assert!(config_from(&["--port", "80"]).validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let config = config_from(&["--port", "51413"]);
        let settings = config.apply_overrides(ClientSettings::default());
        assert_eq!(settings.port, 51413);
        assert_eq!(settings.user_agent, "qBittorrent 4.3.7");
    }
}
