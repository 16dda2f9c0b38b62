use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::hook_system::function::{HookFunction, ToolFunction};

type FunctionKey = (String, String);

/// Code side of the plugin contract.
///
/// Plugin code is linked into the host and registered here under
/// `(plugin_id, function_name)`. The loader binds the declarations it finds
/// in a plugin directory to these entries; a declaration without a
/// matching entry is skipped.
#[derive(Default)]
pub struct FunctionCatalog {
    hooks: RwLock<HashMap<FunctionKey, Arc<dyn HookFunction>>>,
    tools: RwLock<HashMap<FunctionKey, Arc<dyn ToolFunction>>>,
}

impl FunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a hook body for `plugin_id`
    pub fn register_hook(&self, plugin_id: &str, function: &str, body: Arc<dyn HookFunction>) -> &Self {
        match self.hooks.write() {
            Ok(mut hooks) => {
                hooks.insert((plugin_id.to_string(), function.to_string()), body);
            }
            Err(_) => log::error!("Hook catalog lock poisoned, dropping {}::{}", plugin_id, function),
        }
        self
    }

    /// Register (or replace) a tool body for `plugin_id`
    pub fn register_tool(&self, plugin_id: &str, function: &str, body: Arc<dyn ToolFunction>) -> &Self {
        match self.tools.write() {
            Ok(mut tools) => {
                tools.insert((plugin_id.to_string(), function.to_string()), body);
            }
            Err(_) => log::error!("Tool catalog lock poisoned, dropping {}::{}", plugin_id, function),
        }
        self
    }

    pub fn hook(&self, plugin_id: &str, function: &str) -> Option<Arc<dyn HookFunction>> {
        let hooks = self.hooks.read().ok()?;
        hooks.get(&(plugin_id.to_string(), function.to_string())).cloned()
    }

    pub fn tool(&self, plugin_id: &str, function: &str) -> Option<Arc<dyn ToolFunction>> {
        let tools = self.tools.read().ok()?;
        tools.get(&(plugin_id.to_string(), function.to_string())).cloned()
    }

    /// Number of registered hook and tool bodies
    pub fn len(&self) -> usize {
        let hooks = self.hooks.read().map(|h| h.len()).unwrap_or(0);
        let tools = self.tools.read().map(|t| t.len()).unwrap_or(0);
        hooks + tools
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for FunctionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCatalog")
            .field("entries", &self.len())
            .finish()
    }
}
