use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::hook_system::context::{HookContext, ToolContext};
use crate::hook_system::error::HookError;

/// Outcome of one hook body: `Ok(None)` leaves the carried value unchanged,
/// `Ok(Some(v))` replaces it.
pub type HookResult = std::result::Result<Option<Value>, HookError>;

/// A hook body. `args` are private copies; mutating them cannot affect
/// other implementations or the caller.
#[async_trait]
pub trait HookFunction: Send + Sync {
    async fn call(&self, args: Vec<Value>, ctx: &HookContext) -> HookResult;
}

/// A tool body
#[async_trait]
pub trait ToolFunction: Send + Sync {
    async fn invoke(&self, input: Value, ctx: &ToolContext) -> std::result::Result<Value, HookError>;
}

struct SyncHook<F> {
    f: F,
}

#[async_trait]
impl<F> HookFunction for SyncHook<F>
where
    F: Fn(Vec<Value>, &HookContext) -> HookResult + Send + Sync,
{
    async fn call(&self, args: Vec<Value>, ctx: &HookContext) -> HookResult {
        (self.f)(args, ctx)
    }
}

struct SyncTool<F> {
    f: F,
}

#[async_trait]
impl<F> ToolFunction for SyncTool<F>
where
    F: Fn(Value, &ToolContext) -> std::result::Result<Value, HookError> + Send + Sync,
{
    async fn invoke(&self, input: Value, ctx: &ToolContext) -> std::result::Result<Value, HookError> {
        (self.f)(input, ctx)
    }
}

/// Helper function to wrap a synchronous closure as a hook body
pub fn hook_fn<F>(f: F) -> Arc<dyn HookFunction>
where
    F: Fn(Vec<Value>, &HookContext) -> HookResult + Send + Sync + 'static,
{
    Arc::new(SyncHook { f })
}

/// Helper function to wrap a synchronous closure as a tool body
pub fn tool_fn<F>(f: F) -> Arc<dyn ToolFunction>
where
    F: Fn(Value, &ToolContext) -> std::result::Result<Value, HookError> + Send + Sync + 'static,
{
    Arc::new(SyncTool { f })
}
