//! Error types for composition and stylesheet operations.

use thiserror::Error;

/// Result type for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur in composition operations.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Block not found in the composition.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// A block with the same ID already exists.
    #[error("Duplicate block id: {0}")]
    DuplicateBlock(String),

    /// Composition serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a [`StylesheetSource`](crate::source::StylesheetSource).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// No stylesheet is known under the requested identifier.
    #[error("Stylesheet not found: {0}")]
    NotFound(String),

    /// The identifier cannot be mapped to a location.
    #[error("Invalid stylesheet id: {0}")]
    InvalidId(String),

    /// Reading or fetching the stylesheet failed.
    #[error("Failed to fetch stylesheet {id}: {reason}")]
    Fetch {
        /// Stylesheet identifier.
        id: String,
        /// Human-readable cause.
        reason: String,
    },
}
