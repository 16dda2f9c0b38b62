use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::descriptor::PluginState;

/// Context supplied by the caller of a dispatch, typically identifying the
/// user session that triggered it. The engine never inspects the host
/// handle; hooks downcast it to whatever type the host agreed on.
#[derive(Clone, Default)]
pub struct CallContext {
    host: Option<Arc<dyn Any + Send + Sync>>,
}

impl CallContext {
    /// Context without a host handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying `host` as its handle
    pub fn with_host<T: Any + Send + Sync>(host: T) -> Self {
        Self { host: Some(Arc::new(host)) }
    }

    /// Context sharing an existing handle
    pub fn with_shared(host: Arc<dyn Any + Send + Sync>) -> Self {
        Self { host: Some(host) }
    }

    /// Downcast the host handle
    pub fn host<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.host.as_ref().and_then(|h| h.downcast_ref::<T>())
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("has_host", &self.host.is_some())
            .finish()
    }
}

/// What a hook body sees about the invocation it is part of
#[derive(Debug, Clone)]
pub struct HookContext {
    plugin_id: String,
    hook_name: String,
    priority: i32,
    plugin_state: PluginState,
    call: CallContext,
}

impl HookContext {
    pub fn new(
        plugin_id: impl Into<String>,
        hook_name: impl Into<String>,
        priority: i32,
        plugin_state: PluginState,
        call: CallContext,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            hook_name: hook_name.into(),
            priority,
            plugin_state,
            call,
        }
    }

    /// Id of the plugin that owns the running hook
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn hook_name(&self) -> &str {
        &self.hook_name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Lifecycle state of the owning plugin when the hook was invoked
    pub fn plugin_state(&self) -> PluginState {
        self.plugin_state
    }

    pub fn is_plugin_active(&self) -> bool {
        self.plugin_state == PluginState::Active
    }

    pub fn call(&self) -> &CallContext {
        &self.call
    }

    pub fn host<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.call.host::<T>()
    }
}

/// What a tool body sees about its invocation
#[derive(Debug, Clone)]
pub struct ToolContext {
    plugin_id: String,
    tool_name: String,
    call: CallContext,
}

impl ToolContext {
    pub fn new(plugin_id: impl Into<String>, tool_name: impl Into<String>, call: CallContext) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            tool_name: tool_name.into(),
            call,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn host<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.call.host::<T>()
    }
}
