//! Error types for the renderer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for snapshot loading, configuration and rendering.
#[derive(Error, Debug)]
pub enum Error {
    /// Snapshot, metadata or config file does not exist
    #[error("Missing resource: {0}")]
    MissingResource(PathBuf),

    /// Malformed or size-mismatched snapshot / JSON data
    #[error("Invalid format: {0}")]
    Format(String),

    /// Invalid configuration or scene metadata
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Render was interrupted before every pixel finished
    #[error("Render cancelled")]
    Cancelled,

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Create a format error from a string.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an open/read failure to `MissingResource` when the file is absent.
    pub fn from_open(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::MissingResource(path.into())
        } else {
            Self::Io(err)
        }
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::format("density grid has 7 entries");
        assert!(e.to_string().contains("density grid"));

        let e = Error::MissingResource(PathBuf::from("lego.msgpack"));
        assert!(e.to_string().contains("lego.msgpack"));
    }

    #[test]
    fn test_error_from_open() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from_open("a.json", io_err);
        assert!(matches!(err, Error::MissingResource(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        let err = Error::from_open("a.json", io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
