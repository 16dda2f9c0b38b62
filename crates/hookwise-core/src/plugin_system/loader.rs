use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::fs;

use crate::kernel::constants::{
    DECLARATION_EXTENSION, DEFAULT_HOOK_PRIORITY, EXCLUDED_SCAN_DIRS, MANIFEST_FILE,
};
use crate::plugin_system::catalog::FunctionCatalog;
use crate::plugin_system::descriptor::{HookImplementation, PluginDescriptor, ToolImplementation};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::{PluginManifest, RawPluginManifest};

// --- Declaration units ---

/// One entry of a declaration unit, tagged by its `kind` marker
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Declaration {
    Hook {
        function: String,
        /// Hook name, when it differs from the function name
        #[serde(default)]
        hook: Option<String>,
        #[serde(default)]
        priority: Option<i32>,
    },
    Tool {
        function: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        description: String,
    },
}

const DECLARATION_KINDS: &[&str] = &["hook", "tool"];

/// Builds [`PluginDescriptor`]s from plugin directories.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    catalog: Arc<FunctionCatalog>,
}

impl PluginLoader {
    /// Create a new plugin loader binding declarations against `catalog`
    pub fn new(catalog: Arc<FunctionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<FunctionCatalog> {
        &self.catalog
    }

    /// Load the plugin in `path`; its id is the directory name
    pub async fn load(&self, path: &Path) -> Result<PluginDescriptor, PluginSystemError> {
        let id = plugin_id_from_path(path).ok_or_else(|| {
            PluginSystemError::load(
                "<unknown>",
                path,
                format!("cannot derive a plugin id from '{}'", path.display()),
            )
        })?;
        self.load_with_id(&id, path).await
    }

    /// Load the plugin in `path` under an explicit id
    pub async fn load_with_id(&self, id: &str, path: &Path) -> Result<PluginDescriptor, PluginSystemError> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| PluginSystemError::load(id, path, e))?;
        if !metadata.is_dir() {
            return Err(PluginSystemError::load(id, path, "not a directory".to_string()));
        }

        let manifest = self.load_manifest(id, path).await;
        let units = collect_declaration_units(path).await;

        let mut hooks = Vec::new();
        let mut tools = Vec::new();
        for unit in &units {
            let declarations = match read_declarations(unit).await {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("Skipping declaration unit {} of plugin '{}': {}", unit.display(), id, e);
                    continue;
                }
            };
            for declaration in declarations {
                self.bind(id, unit, declaration, &mut hooks, &mut tools);
            }
        }

        log::debug!(
            "Loaded plugin '{}' from {} ({} hooks, {} tools)",
            id,
            path.display(),
            hooks.len(),
            tools.len()
        );
        Ok(PluginDescriptor::new(id, path, manifest, hooks, tools))
    }

    /// Read `plugin.json`, falling back to defaults when absent or malformed
    async fn load_manifest(&self, id: &str, dir: &Path) -> PluginManifest {
        let manifest_path = dir.join(MANIFEST_FILE);
        let content = match fs::read_to_string(&manifest_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Plugin '{}' has no manifest, using defaults", id);
                return PluginManifest::default_for(id);
            }
            Err(e) => {
                log::warn!("Cannot read manifest {}: {}", manifest_path.display(), e);
                return PluginManifest::default_for(id);
            }
        };
        match serde_json::from_str::<RawPluginManifest>(&content) {
            Ok(raw) => PluginManifest::from_raw(id, raw),
            Err(e) => {
                log::warn!("Malformed manifest {}: {}, using defaults", manifest_path.display(), e);
                PluginManifest::default_for(id)
            }
        }
    }

    fn bind(
        &self,
        plugin_id: &str,
        unit: &Path,
        declaration: Declaration,
        hooks: &mut Vec<HookImplementation>,
        tools: &mut Vec<ToolImplementation>,
    ) {
        match declaration {
            Declaration::Hook { function, hook, priority } => {
                let Some(body) = self.catalog.hook(plugin_id, &function) else {
                    log::warn!(
                        "Plugin '{}' declares hook function '{}' in {} but no implementation is registered",
                        plugin_id,
                        function,
                        unit.display()
                    );
                    return;
                };
                let name = hook.unwrap_or_else(|| function.clone());
                hooks.push(HookImplementation::new(
                    name,
                    priority.unwrap_or(DEFAULT_HOOK_PRIORITY),
                    plugin_id,
                    function,
                    body,
                ));
            }
            Declaration::Tool { function, name, description } => {
                let Some(body) = self.catalog.tool(plugin_id, &function) else {
                    log::warn!(
                        "Plugin '{}' declares tool function '{}' in {} but no implementation is registered",
                        plugin_id,
                        function,
                        unit.display()
                    );
                    return;
                };
                let name = name.unwrap_or_else(|| function.clone());
                tools.push(ToolImplementation::new(name, description, plugin_id, function, body));
            }
        }
    }
}

/// Plugin id for a directory: its final path component
pub fn plugin_id_from_path(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
}

/// All declaration unit files below `root`, sorted by path. Unreadable
/// subdirectories are logged and skipped.
async fn collect_declaration_units(root: &Path) -> Vec<PathBuf> {
    let manifest_path = root.join(MANIFEST_FILE);
    let mut units = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to scan {}: {}", dir.display(), e);
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Failed to read entry in {}: {}", dir.display(), e);
                    break;
                }
            };
            let entry_path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("Failed to get file type for {}: {}", entry_path.display(), e);
                    continue;
                }
            };

            if file_type.is_dir() {
                let excluded = entry_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| EXCLUDED_SCAN_DIRS.contains(&n));
                if !excluded {
                    pending.push(entry_path);
                }
            } else if file_type.is_file() && is_declaration_file(&entry_path) && entry_path != manifest_path {
                units.push(entry_path);
            }
        }
    }

    units.sort();
    units
}

fn is_declaration_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DECLARATION_EXTENSION))
}

/// Parse one unit. Invalid JSON is an error for the whole unit; a document
/// that is not an array, or entries without a known `kind` marker, are not
/// declarations and are ignored; a marked entry that fails to parse is
/// logged and skipped.
async fn read_declarations(unit: &Path) -> Result<Vec<Declaration>, PluginSystemError> {
    let content = fs::read_to_string(unit)
        .await
        .map_err(|e| PluginSystemError::load("<unit>", unit, e))?;
    let document: Value =
        serde_json::from_str(&content).map_err(|e| PluginSystemError::load("<unit>", unit, e))?;
    Ok(parse_declarations(unit, document))
}

pub(crate) fn parse_declarations(unit: &Path, document: Value) -> Vec<Declaration> {
    let Value::Array(entries) = document else {
        log::debug!("{} is not a declaration unit", unit.display());
        return Vec::new();
    };

    let mut declarations = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let marked = entry
            .get("kind")
            .and_then(Value::as_str)
            .is_some_and(|kind| DECLARATION_KINDS.contains(&kind));
        if !marked {
            continue;
        }
        match serde_json::from_value::<Declaration>(entry) {
            Ok(declaration) => declarations.push(declaration),
            Err(e) => log::warn!("Invalid declaration #{} in {}: {}", index, unit.display(), e),
        }
    }
    declarations
}
