use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::kernel::constants::{ACTIVE_PLUGINS_KEY, CORE_PLUGIN_ID};
use crate::kernel::error::Result;
use crate::storage::settings::SettingsStore;

/// Reads and writes the list of active plugin ids through a [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct ActivePluginStore {
    store: Arc<dyn SettingsStore>,
}

impl ActivePluginStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Load the active set. A missing or malformed entry reads as empty;
    /// the core plugin is always added.
    pub fn load(&self) -> Result<BTreeSet<String>> {
        let mut active = BTreeSet::new();
        match self.store.get(ACTIVE_PLUGINS_KEY)? {
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::String(id) => {
                            active.insert(id);
                        }
                        other => log::warn!(
                            "Ignoring non-string entry {} in '{}'",
                            other,
                            ACTIVE_PLUGINS_KEY
                        ),
                    }
                }
            }
            Some(other) => log::warn!(
                "Setting '{}' is not a list ({}), treating as empty",
                ACTIVE_PLUGINS_KEY,
                other
            ),
            None => {}
        }
        active.insert(CORE_PLUGIN_ID.to_string());
        Ok(active)
    }

    /// Persist the active set as a sorted, de-duplicated list
    pub fn save(&self, active: &BTreeSet<String>) -> Result<()> {
        let ids: Vec<Value> = active.iter().cloned().map(Value::String).collect();
        self.store.upsert(ACTIVE_PLUGINS_KEY, Value::Array(ids))
    }

    /// Raw stored list, as written by the last `save`
    pub fn stored_list(&self) -> Result<Option<Value>> {
        self.store.get(ACTIVE_PLUGINS_KEY)
    }
}
