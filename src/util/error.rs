//! Error types for the viewer library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for loading, configuring and exporting.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Malformed line in a flat text data file
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Mesh topology is unusable (bad indices, no triangles)
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Landmark file holds the wrong number of values
    #[error("Invalid number of landmark values: expected {expected}, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    /// Rejected render or session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Console command could not be parsed
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Output file extension has no encoder
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Image encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings (de)serialization failed
    #[error("Settings error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a parse error for `path` at 1-based `line`.
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;
