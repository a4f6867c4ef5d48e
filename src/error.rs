//! Error types for ParPut
//!
//! Defines the error type shared by the pool, dispatcher, and transfer
//! layers, with helpers for attaching path and host context.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ParPut operations
#[derive(Error, Debug)]
pub enum ParputError {
    /// I/O error during local file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Path is neither a regular file nor a directory
    #[error("Unsupported file type at '{path}': {file_type}")]
    UnsupportedFileType { path: PathBuf, file_type: String },

    /// Connection to the remote endpoint failed
    #[error("Connection error to '{host}': {message}")]
    ConnectionError { host: String, message: String },

    /// Authentication against the remote endpoint failed
    #[error("Authentication failed for '{user}@{host}': {message}")]
    AuthenticationError {
        user: String,
        host: String,
        message: String,
    },

    /// Remote object or collection operation failed
    #[error("Remote storage error: {0}")]
    RemoteStorageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Worker pool error
    #[error("Worker pool error: {0}")]
    WorkerPoolError(String),

    /// Bounded connection acquisition gave up
    #[error("Timed out after {0:?} waiting for a free connection")]
    AcquireTimeout(std::time::Duration),

    /// A chunk task read short of its assigned byte range
    #[error("Short read at '{path}': expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

impl ParputError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a connection error
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionError {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(
        user: impl Into<String>,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::AuthenticationError {
            user: user.into(),
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a remote storage error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteStorageError(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Get the local path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::NotFound(path)
            | Self::UnsupportedFileType { path, .. }
            | Self::ShortRead { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for ParPut operations
pub type Result<T> = std::result::Result<T, ParputError>;

/// Extension trait for adding path context to `std::io::Result`
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| ParputError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ParputError::io("/test/path", io_err);
        assert!(err.path().is_some());
        assert_eq!(err.path().unwrap(), &PathBuf::from("/test/path"));
    }

    #[test]
    fn test_with_path_extension() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let err = result.with_path("/some/file").unwrap_err();
        assert!(matches!(err, ParputError::Io { .. }));
    }

    #[test]
    fn test_connection_error_display() {
        let err = ParputError::connection("storage.example.com", "refused");
        assert_eq!(
            err.to_string(),
            "Connection error to 'storage.example.com': refused"
        );
        assert!(err.path().is_none());
    }
}
