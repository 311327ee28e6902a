//! Error Handling Module
//!
//! Defines the error type for the tomato diagnosis pipeline.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only two conditions are expected from the pipeline itself: an input
//! that cannot be decoded as an image (fatal for that request) and a
//! weights artifact that cannot be used (recovered by the classifier's
//! fallback mode, never returned from `load_classifier`).

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for tomato diagnosis operations
#[derive(Error, Debug)]
pub enum TomatoError {
    /// The input could not be read or decoded as an image
    #[error("Failed to decode image '{0}': {1}")]
    Decode(String, String),

    /// The weights artifact exists but could not be loaded into the model
    #[error("Failed to load weights from '{0}': {1}")]
    WeightsLoad(PathBuf, String),

    /// Error with model construction or configuration
    #[error("Model error: {0}")]
    Model(String),

    /// Error while running the forward pass
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TomatoError {
    /// Whether this error means no prediction could be produced for the input image
    pub fn is_decode_error(&self) -> bool {
        matches!(self, TomatoError::Decode(..))
    }
}

impl From<serde_json::Error> for TomatoError {
    fn from(err: serde_json::Error) -> Self {
        TomatoError::Serialization(err.to_string())
    }
}

/// Convenience Result type for tomato diagnosis operations
pub type Result<T> = std::result::Result<T, TomatoError>;
