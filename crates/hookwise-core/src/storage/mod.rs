//! # Hookwise Core Storage
//!
//! Persistence seams used by the plugin registry:
//!
//! - **[`settings`]**: the [`SettingsStore`] contract (get/upsert by name)
//!   with an in-memory and a JSON-file implementation.
//! - **[`active_set`]**: [`ActivePluginStore`], the thin adapter that keeps
//!   the `active_plugins` list in a settings store.
//! - **[`config`]**: [`HostConfig`], the filesystem layout of a host, loadable
//!   from JSON, TOML or YAML.
//! - **[`error`]**: [`StorageSystemError`](error::StorageSystemError).
pub mod active_set;
pub mod config;
pub mod error;
pub mod settings;

pub use active_set::ActivePluginStore;
pub use config::{ConfigFormat, HostConfig};
pub use settings::{JsonFileSettingsStore, MemorySettingsStore, SettingsStore};
