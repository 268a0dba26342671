//! Error types for the seeder
//!
//! Every failure the core can report falls into one of a handful of
//! categories. Codec and metadata errors make a single resource unusable;
//! network and persistence errors only cost one announce cycle.

use std::fmt;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, SeederError>;

/// Error type for seeder operations
#[derive(Debug, Clone)]
pub enum SeederError {
    /// Bencode input that could not be decoded
    MalformedEncoding {
        message: String,
        offset: usize,
    },

    /// Metadata file missing required keys or holding inconsistent values
    InvalidMetadata {
        message: String,
        field: Option<String>,
    },

    /// Tracker unreachable, timed out, or answered with something unusable
    NetworkFailure {
        message: String,
        address: Option<String>,
        source: Option<String>,
    },

    /// Identity store or settings I/O errors
    PersistenceFailure {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },
}

impl SeederError {
    /// Create a new MalformedEncoding error at a byte offset
    pub fn malformed_encoding_at(message: impl Into<String>, offset: usize) -> Self {
        SeederError::MalformedEncoding {
            message: message.into(),
            offset,
        }
    }

    /// Create a new InvalidMetadata error
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        SeederError::InvalidMetadata {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new InvalidMetadata error naming the offending key
    pub fn invalid_metadata_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        SeederError::InvalidMetadata {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new NetworkFailure
    pub fn network_failure(message: impl Into<String>) -> Self {
        SeederError::NetworkFailure {
            message: message.into(),
            address: None,
            source: None,
        }
    }

    /// Create a new NetworkFailure with tracker address
    pub fn network_failure_with_address(message: impl Into<String>, address: impl Into<String>) -> Self {
        SeederError::NetworkFailure {
            message: message.into(),
            address: Some(address.into()),
            source: None,
        }
    }

    /// Create a new NetworkFailure with address and source
    pub fn network_failure_full(message: impl Into<String>, address: impl Into<String>, source: impl Into<String>) -> Self {
        SeederError::NetworkFailure {
            message: message.into(),
            address: Some(address.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new PersistenceFailure
    pub fn persistence_failure(message: impl Into<String>) -> Self {
        SeederError::PersistenceFailure {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a new PersistenceFailure with path and source
    pub fn persistence_failure_full(message: impl Into<String>, path: impl Into<String>, source: impl Into<String>) -> Self {
        SeederError::PersistenceFailure {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        SeederError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        SeederError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// The resource this error belongs to cannot be loaded at all
    pub fn is_resource_fatal(&self) -> bool {
        matches!(
            self,
            SeederError::MalformedEncoding { .. } | SeederError::InvalidMetadata { .. }
        )
    }

    /// Only the current cycle is lost; the next scheduled attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SeederError::NetworkFailure { .. } | SeederError::PersistenceFailure { .. }
        )
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        match &mut self {
            SeederError::NetworkFailure { source, .. } | SeederError::PersistenceFailure { source, .. } => {
                *source = Some(source.as_ref().map_or_else(|| ctx.clone(), |s| format!("{}: {}", s, ctx)));
            }
            SeederError::MalformedEncoding { message, .. }
            | SeederError::InvalidMetadata { message, .. }
            | SeederError::ConfigError { message, .. } => {
                *message = format!("{} ({})", message, ctx);
            }
        }
        self
    }
}

impl fmt::Display for SeederError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeederError::MalformedEncoding { message, offset } => {
                write!(f, "Malformed encoding: {} (offset: {})", message, offset)
            }
            SeederError::InvalidMetadata { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Invalid metadata: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Invalid metadata: {}", message)
                }
            }
            SeederError::NetworkFailure { message, address, source } => {
                match (address, source) {
                    (Some(a), Some(s)) => write!(f, "Network failure: {} (address: {}, source: {})", message, a, s),
                    (Some(a), None) => write!(f, "Network failure: {} (address: {})", message, a),
                    (None, Some(s)) => write!(f, "Network failure: {} (source: {})", message, s),
                    (None, None) => write!(f, "Network failure: {}", message),
                }
            }
            SeederError::PersistenceFailure { message, path, source } => {
                match (path, source) {
                    (Some(p), Some(s)) => write!(f, "Persistence failure: {} (path: {}, source: {})", message, p, s),
                    (Some(p), None) => write!(f, "Persistence failure: {} (path: {})", message, p),
                    (None, Some(s)) => write!(f, "Persistence failure: {} (source: {})", message, s),
                    (None, None) => write!(f, "Persistence failure: {}", message),
                }
            }
            SeederError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for SeederError {}

impl From<std::io::Error> for SeederError {
    fn from(err: std::io::Error) -> Self {
        SeederError::persistence_failure_full(err.to_string(), "unknown", err.kind().to_string())
    }
}

impl From<serde_json::Error> for SeederError {
    fn from(err: serde_json::Error) -> Self {
        SeederError::persistence_failure_full("Failed to process JSON data", "unknown", err.to_string())
    }
}

impl From<reqwest::Error> for SeederError {
    fn from(err: reqwest::Error) -> Self {
        let address = err.url().map(|u| u.to_string()).unwrap_or_else(|| "unknown".to_string());
        if err.is_timeout() {
            SeederError::network_failure_full("Tracker request timed out", address, err.to_string())
        } else {
            SeederError::network_failure_full("Tracker request failed", address, err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for SeederError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SeederError::network_failure("Operation timed out")
    }
}

impl From<url::ParseError> for SeederError {
    fn from(err: url::ParseError) -> Self {
        SeederError::invalid_metadata_with_field(format!("Invalid announce URL: {}", err), "announce")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_encoding_at() {
        let err = SeederError::malformed_encoding_at("Unterminated integer", 7);
        assert_eq!(err.to_string(), "Malformed encoding: Unterminated integer (offset: 7)");
        assert!(err.is_resource_fatal());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_invalid_metadata_with_field() {
        let err = SeederError::invalid_metadata_with_field("Missing key", "piece length");
        assert!(err.to_string().contains("Invalid metadata"));
        assert!(err.to_string().contains("piece length"));
    }

    #[test]
    fn test_network_failure_full() {
        let err = SeederError::network_failure_full("Connection refused", "http://tracker.example/announce", "os error 111");
        assert!(err.to_string().contains("Network failure"));
        assert!(err.to_string().contains("http://tracker.example/announce"));
        assert!(err.is_transient());
        assert!(!err.is_resource_fatal());
    }

    #[test]
    fn test_with_context() {
        let err = SeederError::persistence_failure("Write failed").with_context("saving peer data");
        assert!(err.to_string().contains("saving peer data"));

        let err = SeederError::invalid_metadata("Missing info").with_context("ubuntu.torrent");
        assert!(err.to_string().contains("ubuntu.torrent"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: SeederError = io_err.into();
        assert!(matches!(err, SeederError::PersistenceFailure { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: SeederError = url_err.into();
        assert!(matches!(err, SeederError::InvalidMetadata { .. }));
    }

    #[test]
    fn test_config_error_with_field() {
        let err = SeederError::config_error_with_field("Port out of range", "port");
        assert!(err.to_string().contains("Config error"));
        assert!(err.to_string().contains("port"));
    }
}
