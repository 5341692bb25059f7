//! Error types for the booth core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for booth operations.
pub type BoothResult<T> = Result<T, BoothError>;

/// Errors surfaced to the collaborators around the per-frame pipeline.
///
/// None of these are produced inside a tick; a tick always yields a frame.
#[derive(Debug, Error)]
pub enum BoothError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported background source: {0}")]
    UnsupportedBackground(String),

    #[error("Failed to load background image {path}: {source}")]
    BackgroundLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to fetch background image {url}: {source}")]
    BackgroundFetch {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write photo {}: {source}", path.display())]
    PhotoWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BoothError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
