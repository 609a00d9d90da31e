//! Error Handling Module
//!
//! Defines the error type shared by the model, dataset, training and session
//! modules. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for deepwater operations
#[derive(Error, Debug)]
pub enum DeepWaterError {
    /// Error with dataset loading or parsing
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error building a model
    #[error("Model error: {0}")]
    Model(String),

    /// Unknown network preset name
    #[error("Unsupported network preset: {0}")]
    UnsupportedNetwork(String),

    /// Error during training
    #[error("Training error: {0}")]
    Training(String),

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

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for DeepWaterError {
    fn from(err: serde_json::Error) -> Self {
        DeepWaterError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for DeepWaterError {
    fn from(err: image::ImageError) -> Self {
        DeepWaterError::Dataset(err.to_string())
    }
}

impl From<burn::record::RecorderError> for DeepWaterError {
    fn from(err: burn::record::RecorderError) -> Self {
        DeepWaterError::Serialization(format!("{:?}", err))
    }
}

/// Convenience Result type for deepwater operations
pub type Result<T> = std::result::Result<T, DeepWaterError>;
