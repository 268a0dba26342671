//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the seeder
#[derive(Debug, Parser)]
#[command(name = "rust-torrent-seeder")]
#[command(about = "Keeps torrents announced to their trackers as fully seeded", long_about = None)]
pub struct CliArgs {
    /// Directory holding the .torrent files to announce
    #[arg(short, long, value_name = "DIR", default_value = "./torrent")]
    pub torrent_dir: PathBuf,

    /// Announce identity file (default: <TORRENT_DIR>/peer_data.json)
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Display settings file (default: <TORRENT_DIR>/config.json)
    #[arg(long, value_name = "FILE")]
    pub settings_file: Option<PathBuf>,

    /// User agent presented to trackers (overrides the settings file)
    #[arg(short, long)]
    pub user_agent: Option<String>,

    /// Port reported to trackers (overrides the settings file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds between scheduling passes over all torrents
    #[arg(long, default_value_t = 5)]
    pub tick_secs: u64,

    /// Tracker request timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout_secs: u64,

    /// Largest upload increase reported per periodic announce, in bytes
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    pub upload_step_max: u64,

    /// Seed for identity and scheduling randomness
    #[arg(long)]
    pub seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let args = CliArgs::try_parse_from(["rust-torrent-seeder"]).unwrap();

        assert_eq!(args.torrent_dir, PathBuf::from("./torrent"));
        assert_eq!(args.tick_secs, 5);
        assert_eq!(args.timeout_secs, 20);
        assert_eq!(args.upload_step_max, 16 * 1024 * 1024);
        assert!(args.port.is_none());
        assert!(args.user_agent.is_none());
        assert_eq!(args.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "rust-torrent-seeder",
            "--torrent-dir",
            "/srv/torrents",
            "--port",
            "51413",
            "--user-agent",
            "Transmission/3.00",
            "--seed",
            "7",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.torrent_dir, PathBuf::from("/srv/torrents"));
        assert_eq!(args.port, Some(51413));
        assert_eq!(args.user_agent.as_deref(), Some("Transmission/3.00"));
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.log_level(), tracing::Level::DEBUG);
    }
}
