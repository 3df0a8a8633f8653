//! Host environment capabilities.
//!
//! The attempt controller needs a fullscreen capability from whatever
//! hosts it (a browser shell, a desktop webview, or nothing at all for
//! the CLI). A missing capability degrades gracefully: the attempt
//! proceeds without fullscreen enforcement and an integrity note is
//! logged instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("fullscreen is not supported by this environment")]
    Unsupported,

    #[error("fullscreen request denied: {0}")]
    Denied(String),
}

/// Capabilities the host environment exposes to the engine.
pub trait Environment {
    /// Whether a fullscreen API exists at all.
    fn fullscreen_supported(&self) -> bool {
        true
    }

    fn enter_fullscreen(&mut self) -> Result<(), EnvironmentError>;

    fn exit_fullscreen(&mut self) -> Result<(), EnvironmentError>;

    fn is_fullscreen(&self) -> bool;
}

/// Environment with no capabilities. Used by the CLI and headless tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnvironment;

impl Environment for NoopEnvironment {
    fn fullscreen_supported(&self) -> bool {
        false
    }

    fn enter_fullscreen(&mut self) -> Result<(), EnvironmentError> {
        Err(EnvironmentError::Unsupported)
    }

    fn exit_fullscreen(&mut self) -> Result<(), EnvironmentError> {
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        false
    }
}
