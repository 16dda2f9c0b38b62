//! # Hookwise Core Kernel
//!
//! The `kernel` module wires the engine together for a host.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application)
//!   builds the function catalog, settings store and plugin registry from a
//!   [`HostConfig`](crate::storage::HostConfig) and runs the startup discovery.
//! - **Core Constants**: reserved ids, settings keys and file names in the
//!   `constants` submodule.
//! - **Error Handling**: the umbrella [`Error`](error::Error) and `Result`
//!   alias in the `error` submodule.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use error::{Error, Result};
