//! # Hookwise Core Hook System Errors
//!
//! [`DispatchError`] is what callers of
//! [`HookDispatcher::execute`](crate::hook_system::HookDispatcher::execute)
//! can see. [`HookError`] is what a single hook or tool body reports; the
//! dispatcher wraps it into a [`HookExecutionError`], logs it and moves on.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Hook '{0}' is not implemented by any active plugin")]
    UnknownHook(String),
}

/// Failure reported by one hook or tool body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl HookError {
    pub fn failed(message: impl Into<String>) -> Self {
        HookError::Failed(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        HookError::InvalidArgument(message.into())
    }
}

/// One hook implementation failed during dispatch. Logged, never returned
/// to the caller of `execute`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Error in plugin {plugin_id}::{hook_name} (function '{function}'): {source}")]
pub struct HookExecutionError {
    pub plugin_id: String,
    pub hook_name: String,
    pub function: String,
    #[source]
    pub source: HookError,
}

/// Failure reported by a tool body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool '{tool}' of plugin '{plugin_id}' failed: {message}")]
    Failed {
        plugin_id: String,
        tool: String,
        message: String,
    },

    #[error("Tool '{tool}' of plugin '{plugin_id}' panicked: {message}")]
    Panicked {
        plugin_id: String,
        tool: String,
        message: String,
    },
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}
