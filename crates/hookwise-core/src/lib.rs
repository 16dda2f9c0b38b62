//! # Hookwise Core
//!
//! Plugin and hook orchestration engine. Plugins are directories under a
//! plugins root; each declares hook and tool implementations that the host
//! binds to Rust code through a [`FunctionCatalog`]. The
//! [`PluginRegistry`] owns discovery and the active set, and publishes an
//! immutable snapshot that the [`HookDispatcher`] runs hooks against.
pub mod hook_system;
pub mod kernel;
pub mod plugin_system;
pub mod storage;

// Re-export key public types for easier use by the binary and hosts
pub use hook_system::{hook_fn, tool_fn, CallContext, DispatchError, HookContext, HookDispatcher, HookError, HookFunction, HookResult, ToolContext, ToolFunction};
pub use kernel::error::{Error as KernelError, Result};
pub use kernel::Application;
pub use plugin_system::{FunctionCatalog, PluginDescriptor, PluginManifest, PluginRegistry, PluginState, PluginSystemError};
pub use storage::{HostConfig, SettingsStore};

#[cfg(test)]
mod tests;
