use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::hook_system::context::{CallContext, ToolContext};
use crate::hook_system::error::ToolError;
use crate::hook_system::function::{HookFunction, ToolFunction};
use crate::plugin_system::manifest::PluginManifest;

/// Lifecycle state of a discovered plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Inactive,
    Active,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Inactive => write!(f, "inactive"),
            PluginState::Active => write!(f, "active"),
        }
    }
}

/// One plugin's implementation of a hook
pub struct HookImplementation {
    name: String,
    priority: i32,
    plugin_id: String,
    function_name: String,
    function: Arc<dyn HookFunction>,
}

impl HookImplementation {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        plugin_id: impl Into<String>,
        function_name: impl Into<String>,
        function: Arc<dyn HookFunction>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            plugin_id: plugin_id.into(),
            function_name: function_name.into(),
            function,
        }
    }

    /// Hook name this implementation binds to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Higher runs earlier
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Declared function name, as listed in the plugin's declarations
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function(&self) -> &Arc<dyn HookFunction> {
        &self.function
    }
}

impl fmt::Debug for HookImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookImplementation")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("plugin_id", &self.plugin_id)
            .field("function_name", &self.function_name)
            .finish_non_exhaustive()
    }
}

/// A named, described unit a plugin exposes for downstream selection
pub struct ToolImplementation {
    name: String,
    description: String,
    plugin_id: String,
    function_name: String,
    function: Arc<dyn ToolFunction>,
}

impl ToolImplementation {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        plugin_id: impl Into<String>,
        function_name: impl Into<String>,
        function: Arc<dyn ToolFunction>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            plugin_id: plugin_id.into(),
            function_name: function_name.into(),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Run the tool with its owning plugin id in context.
    pub async fn invoke(&self, input: Value, call: &CallContext) -> Result<Value, ToolError> {
        use futures::FutureExt;
        use std::panic::AssertUnwindSafe;

        let ctx = ToolContext::new(&self.plugin_id, &self.name, call.clone());
        match AssertUnwindSafe(self.function.invoke(input, &ctx)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ToolError::Failed {
                plugin_id: self.plugin_id.clone(),
                tool: self.name.clone(),
                message: e.to_string(),
            }),
            Err(payload) => Err(ToolError::Panicked {
                plugin_id: self.plugin_id.clone(),
                tool: self.name.clone(),
                message: crate::hook_system::error::panic_message(payload),
            }),
        }
    }
}

impl fmt::Debug for ToolImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolImplementation")
            .field("name", &self.name)
            .field("plugin_id", &self.plugin_id)
            .field("function_name", &self.function_name)
            .finish_non_exhaustive()
    }
}

/// Everything known about one discovered plugin.
///
/// Hooks and tools are fixed at load time; only the lifecycle state
/// changes afterwards, and only through the registry.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    id: String,
    path: PathBuf,
    manifest: PluginManifest,
    hooks: Vec<Arc<HookImplementation>>,
    tools: Vec<Arc<ToolImplementation>>,
    state: PluginState,
}

impl PluginDescriptor {
    /// New descriptor, always starting inactive
    pub fn new(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        manifest: PluginManifest,
        hooks: Vec<HookImplementation>,
        tools: Vec<ToolImplementation>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            manifest,
            hooks: hooks.into_iter().map(Arc::new).collect(),
            tools: tools.into_iter().map(Arc::new).collect(),
            state: PluginState::Inactive,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Hook implementations in declaration order
    pub fn hooks(&self) -> &[Arc<HookImplementation>] {
        &self.hooks
    }

    pub fn tools(&self) -> &[Arc<ToolImplementation>] {
        &self.tools
    }

    /// Own implementations of one hook name, in declaration order
    pub fn hooks_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<HookImplementation>> + 'a {
        self.hooks.iter().filter(move |h| h.name() == name)
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PluginState::Active
    }

    pub(crate) fn activate(&mut self) {
        self.state = PluginState::Active;
    }

    pub(crate) fn deactivate(&mut self) {
        self.state = PluginState::Inactive;
    }
}
