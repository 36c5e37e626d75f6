//! Error types for watch-folder processing

use std::path::Path;
use thiserror::Error;

/// Result type alias for watch-folder operations
pub type Result<T> = std::result::Result<T, BgWatchError>;

/// Errors raised while loading configuration, watching the source directory,
/// uploading files or relocating them
#[derive(Error, Debug)]
pub enum BgWatchError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read, parsed or validated
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure talking to the processing API
    #[error("Network error: {0}")]
    Network(String),

    /// The processing API answered with something other than 200 OK
    #[error("API returned status {status}: {body}")]
    Api {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Response body text, kept verbatim for diagnosis
        body: String,
    },

    /// Filesystem notification subsystem failure
    #[error("Watcher error: {0}")]
    Watch(String),

    /// Moving a processed original into the archive directory failed
    #[error("Relocation error: {0}")]
    Relocation(String),
}

impl BgWatchError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration error for a required key that is absent or empty
    pub fn missing_config_key(key: &str) -> Self {
        Self::Config(format!("required key '{key}' is missing or empty"))
    }

    /// Create a watcher error
    pub fn watch<S: Into<String>>(msg: S) -> Self {
        Self::Watch(msg.into())
    }

    /// Create a relocation error
    pub fn relocation<S: Into<String>>(msg: S) -> Self {
        Self::Relocation(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create network error with request context
    pub fn network_error<S: AsRef<str>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {error}", context.as_ref()))
    }

    /// Create relocation error with both ends of the move in the message
    pub fn relocation_error(source: &Path, destination: &Path, error: &std::io::Error) -> Self {
        Self::Relocation(format!(
            "Failed to move '{}' to '{}': {error}",
            source.display(),
            destination.display()
        ))
    }

    /// Whether this error happened before any request left the process
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Config(_))
    }
}

impl From<notify::Error> for BgWatchError {
    fn from(error: notify::Error) -> Self {
        Self::Watch(error.to_string())
    }
}
