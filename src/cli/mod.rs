//! CLI module
//!
//! Command-line interface, runtime configuration and display settings.

pub mod args;
pub mod config;
pub mod display;
pub mod settings;

pub use args::CliArgs;
pub use config::Config;
pub use display::{format_bytes, format_duration};
pub use settings::{ClientSettings, SettingsHandle, DEFAULT_USER_AGENT};
