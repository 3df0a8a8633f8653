//! Core error types for examroom-core.
//!
//! This module defines the error hierarchy used across the library,
//! built on thiserror. Backend transport errors live in [`crate::api`]
//! as [`ApiError`] and are folded in here via `#[from]`.

use std::path::PathBuf;
use thiserror::Error;

use crate::api::ApiError;
use crate::environment::EnvironmentError;

/// Core error type for examroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backend (persistence/catalog service) errors
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Host environment capability errors
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Out of bounds
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Operation attempted in a phase that does not allow it
    #[error("Operation '{operation}' not allowed in phase '{phase}'")]
    WrongPhase { operation: String, phase: String },
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
