//! # Hookwise Core Plugin System
//!
//! Owns everything about plugins except running their hooks: discovering
//! plugin directories, reading manifests and declaration units, binding
//! declarations to host-registered code, tracking which plugins are active,
//! and publishing the hook and tool indexes the dispatcher reads.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`registry`]**: [`PluginRegistry`], the single owner of the plugin map
//!   and active set. Discover, install, uninstall and toggle live here.
//! - **[`loader`]**: [`PluginLoader`], turns one plugin directory into a
//!   [`PluginDescriptor`].
//! - **[`catalog`]**: [`FunctionCatalog`], where the host registers the Rust
//!   bodies that declarations refer to by name.
//! - **[`manifest`]**: [`PluginManifest`] metadata with defaults.
//! - **[`descriptor`]**: [`PluginDescriptor`], [`HookImplementation`],
//!   [`ToolImplementation`] and [`PluginState`].
//! - **[`snapshot`]**: [`HookSnapshot`] and the [`SnapshotCell`] it is
//!   published through.
//! - **[`extractor`]**: the [`PluginExtractor`] seam used by install, with the
//!   `.tar.gz` implementation.
//! - **[`error`]**: [`PluginSystemError`].
pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod snapshot;

pub use catalog::FunctionCatalog;
pub use descriptor::{HookImplementation, PluginDescriptor, PluginState, ToolImplementation};
pub use error::PluginSystemError;
pub use extractor::{PluginExtractor, TarGzExtractor};
pub use loader::PluginLoader;
pub use manifest::PluginManifest;
pub use registry::{ChangeListener, PluginRegistry};
pub use snapshot::{HookEntry, HookSnapshot, SnapshotCell, SnapshotLayout, ToolEntry};
