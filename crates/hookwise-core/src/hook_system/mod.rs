//! # Hookwise Core Hook System
//!
//! Extension-point dispatch. A hook name maps to an ordered list of
//! implementations contributed by active plugins; the [`HookDispatcher`]
//! runs that list either for side effects (no arguments) or as a pipe that
//! threads a carried value through every implementation.
//!
//! - **[`dispatcher`]**: [`HookDispatcher`], execution and failure isolation.
//! - **[`context`]**: [`CallContext`] supplied by callers, [`HookContext`] and
//!   [`ToolContext`] handed to plugin code.
//! - **[`function`]**: the [`HookFunction`] and [`ToolFunction`] traits plugin
//!   code implements, plus closure adapters.
//! - **[`error`]**: [`DispatchError`], [`HookError`] and friends.
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod function;

pub use context::{CallContext, HookContext, ToolContext};
pub use dispatcher::HookDispatcher;
pub use error::{DispatchError, HookError, HookExecutionError, ToolError};
pub use function::{hook_fn, tool_fn, HookFunction, HookResult, ToolFunction};
