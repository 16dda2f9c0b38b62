//! # Hookwise Core Kernel Errors
//!
//! Defines the umbrella error type for `hookwise-core`.
//!
//! Each subsystem owns a typed error enum ([`PluginSystemError`],
//! [`DispatchError`], [`StorageSystemError`]); [`Error`] wraps them so that
//! host code can use a single `Result` alias across the crate.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::hook_system::error::DispatchError;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;

/// Top-level error for the hookwise engine
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Hook dispatch error
    #[error("Hook dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Error raised while wiring the host together
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wrap an I/O error with the operation and path it failed on
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// Returns the plugin system error this wraps, if any
    pub fn as_plugin_error(&self) -> Option<&PluginSystemError> {
        match self {
            Error::PluginSystem(e) => Some(e),
            _ => None,
        }
    }
}
