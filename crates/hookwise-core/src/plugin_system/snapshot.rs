use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::plugin_system::descriptor::{HookImplementation, PluginDescriptor, ToolImplementation};

/// Immutable pair of hook index and tool index derived from the plugin map
/// and the active set. Never mutated after construction; the registry
/// publishes a fresh one after every change.
#[derive(Debug, Default)]
pub struct HookSnapshot {
    hooks: HashMap<String, Vec<Arc<HookImplementation>>>,
    tools: Vec<Arc<ToolImplementation>>,
}

impl HookSnapshot {
    /// Derive the indexes. Only plugins in `active` contribute; each hook
    /// list is stably sorted by priority, highest first, so equal priorities
    /// keep discovery order.
    pub fn build(plugins: &[PluginDescriptor], active: &BTreeSet<String>) -> Self {
        let mut hooks: HashMap<String, Vec<Arc<HookImplementation>>> = HashMap::new();
        let mut tools = Vec::new();

        for plugin in plugins.iter().filter(|p| active.contains(p.id())) {
            tools.extend(plugin.tools().iter().cloned());
            for hook in plugin.hooks() {
                hooks.entry(hook.name().to_string()).or_default().push(Arc::clone(hook));
            }
        }

        for list in hooks.values_mut() {
            list.sort_by(|a, b| b.priority().cmp(&a.priority()));
        }

        Self { hooks, tools }
    }

    /// Implementations of `hook_name` in execution order, `None` when no
    /// active plugin implements it
    pub fn implementations(&self, hook_name: &str) -> Option<&[Arc<HookImplementation>]> {
        self.hooks
            .get(hook_name)
            .filter(|list| !list.is_empty())
            .map(|list| list.as_slice())
    }

    /// Tools of all active plugins
    pub fn tools(&self) -> &[Arc<ToolImplementation>] {
        &self.tools
    }

    pub fn hook_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Comparable description of both indexes
    pub fn layout(&self) -> SnapshotLayout {
        let hooks = self
            .hooks
            .iter()
            .map(|(name, list)| {
                let entries = list
                    .iter()
                    .map(|h| HookEntry {
                        plugin_id: h.plugin_id().to_string(),
                        function: h.function_name().to_string(),
                        priority: h.priority(),
                    })
                    .collect();
                (name.clone(), entries)
            })
            .collect();
        let tools = self
            .tools
            .iter()
            .map(|t| ToolEntry {
                plugin_id: t.plugin_id().to_string(),
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        SnapshotLayout { hooks, tools }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookEntry {
    pub plugin_id: String,
    pub function: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolEntry {
    pub plugin_id: String,
    pub name: String,
    pub description: String,
}

/// Plain-data view of a [`HookSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotLayout {
    pub hooks: BTreeMap<String, Vec<HookEntry>>,
    pub tools: Vec<ToolEntry>,
}

/// Publication point for the current snapshot.
///
/// Readers take the lock only long enough to clone the `Arc`; writers only
/// long enough to replace it.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Arc<HookSnapshot>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot
    pub fn load(&self) -> Arc<HookSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            // The guarded value is a single Arc, it cannot be left half-written
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the current snapshot
    pub fn store(&self, snapshot: Arc<HookSnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
