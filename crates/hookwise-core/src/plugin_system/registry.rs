use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::hook_system::context::CallContext;
use crate::hook_system::dispatcher::{run_isolated, HookDispatcher};
use crate::hook_system::error::panic_message;
use crate::kernel::constants::{ACTIVATED_HOOK, CORE_PLUGIN_ID, DEACTIVATED_HOOK, STAGING_DIR_PREFIX};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::catalog::FunctionCatalog;
use crate::plugin_system::descriptor::{PluginDescriptor, PluginState, ToolImplementation};
use crate::plugin_system::error::{PluginSystemError, PluginSystemErrorSource};
use crate::plugin_system::extractor::{PluginExtractor, TarGzExtractor};
use crate::plugin_system::loader::{plugin_id_from_path, PluginLoader};
use crate::plugin_system::snapshot::{HookSnapshot, SnapshotCell};
use crate::storage::active_set::ActivePluginStore;
use crate::storage::config::HostConfig;
use crate::storage::settings::SettingsStore;

/// Callback fired once after every discover, install, uninstall or toggle
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Plugin map plus active set. Only touched under the registry lock.
#[derive(Debug, Default)]
struct RegistryState {
    /// Discovery order
    plugins: Vec<PluginDescriptor>,
    active: BTreeSet<String>,
}

impl RegistryState {
    fn position(&self, id: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.id() == id)
    }

    /// Insert a freshly loaded plugin, replacing an existing entry with the
    /// same id in place
    fn upsert(&mut self, mut plugin: PluginDescriptor) -> usize {
        if self.active.contains(plugin.id()) {
            plugin.activate();
        }
        match self.position(plugin.id()) {
            Some(index) => {
                self.plugins[index] = plugin;
                index
            }
            None => {
                self.plugins.push(plugin);
                self.plugins.len() - 1
            }
        }
    }
}

/// Owns discovered plugins and the active set, and publishes the hook and
/// tool indexes derived from them.
///
/// Administrative operations serialize on one async lock held across the
/// whole mutate, persist, rebuild and publish sequence. Dispatches never
/// take that lock; they read the published [`HookSnapshot`].
pub struct PluginRegistry {
    config: HostConfig,
    loader: PluginLoader,
    active_store: ActivePluginStore,
    extractor: Arc<dyn PluginExtractor>,
    state: Mutex<RegistryState>,
    snapshots: Arc<SnapshotCell>,
    on_change: RwLock<Option<ChangeListener>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("config", &self.config)
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Create an empty registry. Nothing is loaded until [`discover`](Self::discover).
    pub fn new(config: HostConfig, catalog: Arc<FunctionCatalog>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            config,
            loader: PluginLoader::new(catalog),
            active_store: ActivePluginStore::new(settings),
            extractor: Arc::new(TarGzExtractor::new()),
            state: Mutex::new(RegistryState::default()),
            snapshots: Arc::new(SnapshotCell::new()),
            on_change: RwLock::new(None),
        }
    }

    /// Replace the archive extractor used by [`install`](Self::install)
    pub fn with_extractor(mut self, extractor: Arc<dyn PluginExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set the change notification, replacing any previous one
    pub fn set_on_change(&self, listener: impl Fn() + Send + Sync + 'static) {
        match self.on_change.write() {
            Ok(mut slot) => *slot = Some(Arc::new(listener)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::new(listener)),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<FunctionCatalog> {
        self.loader.catalog()
    }

    /// A dispatcher reading this registry's published snapshots
    pub fn dispatcher(&self) -> HookDispatcher {
        HookDispatcher::new(Arc::clone(&self.snapshots))
    }

    /// The currently published indexes
    pub fn snapshot(&self) -> Arc<HookSnapshot> {
        self.snapshots.load()
    }

    /// Tools of all active plugins
    pub fn tools(&self) -> Vec<Arc<ToolImplementation>> {
        self.snapshots.load().tools().to_vec()
    }

    // --- Administrative operations ---

    /// Rebuild everything from disk and the settings store.
    ///
    /// The new plugin map is assembled aside and only replaces the current
    /// one once the active set has been read and persisted, so a failing
    /// store leaves the registry and its published indexes untouched.
    pub async fn discover(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        let stored = self.active_store.load()?;
        log::info!("Active plugins: {:?}", stored);
        let mut next = RegistryState {
            plugins: Vec::new(),
            active: stored.clone(),
        };

        let core_dir = self.config.core_plugin_dir.clone();
        if tokio::fs::metadata(&core_dir).await.is_ok_and(|m| m.is_dir()) {
            match self.loader.load_with_id(CORE_PLUGIN_ID, &core_dir).await {
                Ok(plugin) => {
                    next.upsert(plugin);
                }
                Err(e) => log::error!("{}", e),
            }
        } else {
            log::warn!("Built-in plugin directory {} not found", core_dir.display());
        }

        for dir in self.list_plugin_dirs().await {
            match self.loader.load(&dir).await {
                Ok(plugin) if plugin.id() == CORE_PLUGIN_ID => {
                    log::warn!(
                        "Ignoring {}: '{}' is reserved for the built-in plugin",
                        dir.display(),
                        CORE_PLUGIN_ID
                    );
                }
                Ok(plugin) => {
                    next.upsert(plugin);
                }
                Err(e) => log::error!("{}", e),
            }
        }

        // Drop ids with nothing on disk behind them
        let known: BTreeSet<String> = next.plugins.iter().map(|p| p.id().to_string()).collect();
        next.active.retain(|id| id == CORE_PLUGIN_ID || known.contains(id));
        if next.active != stored {
            log::warn!("Pruning active plugins not found on disk");
        }
        if next.active != stored || self.stored_differs(&next.active)? {
            self.active_store.save(&next.active)?;
        }

        *state = next;
        self.publish(&state);
        log::info!("Discovered {} plugins", state.plugins.len());
        drop(state);

        self.notify_change();
        Ok(())
    }

    /// Install a packaged plugin and activate it. Returns the new plugin id.
    ///
    /// The archive is unpacked and validated in a staging directory inside
    /// the plugins root. The plugin directory then replaces any previous
    /// version as a whole. Failures up to that point leave the plugins root
    /// as it was.
    pub async fn install(&self, archive: &Path) -> Result<String> {
        let mut state = self.state.lock().await;

        let plugins_root = self.config.plugins_root.clone();
        tokio::fs::create_dir_all(&plugins_root)
            .await
            .map_err(|e| Error::io(e, "create_plugins_root", plugins_root.clone()))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(&plugins_root)
            .map_err(|e| Error::io(e, "create_staging_dir", plugins_root.clone()))?;
        let unpacked = staging.path().join("unpacked");
        tokio::fs::create_dir(&unpacked)
            .await
            .map_err(|e| Error::io(e, "create_staging_dir", unpacked.clone()))?;

        let extractor = Arc::clone(&self.extractor);
        let archive_owned = archive.to_path_buf();
        let unpacked_owned = unpacked.clone();
        let staged = tokio::task::spawn_blocking(move || extractor.extract(&archive_owned, &unpacked_owned))
            .await
            .map_err(|e| PluginSystemError::install(archive, format!("extraction task failed: {}", e)))??;

        if let Err(e) = tokio::fs::remove_file(archive).await {
            log::warn!("Could not remove plugin archive {}: {}", archive.display(), e);
        }

        let id = self.validate_staged_dir(archive, &unpacked, &staged).await?;
        let dir = plugins_root.join(&id);
        let previous = self
            .swap_into_place(archive, &staged, &dir, &staging.path().join("previous"))
            .await?;
        let plugin = match self.loader.load(&dir).await {
            Ok(plugin) => plugin,
            Err(e) => {
                self.restore_previous(&dir, previous.as_deref()).await;
                return Err(PluginSystemError::InstallError {
                    archive: archive.to_path_buf(),
                    message: format!("extracted plugin '{}' failed to load", id),
                    source: Some(Box::new(e.to_string().into())),
                }
                .into());
            }
        };
        // Discards the replaced version, if any
        drop(staging);

        let index = state.upsert(plugin);
        log::info!("Installed plugin '{}' into {}", id, dir.display());

        if !state.active.contains(&id) {
            self.activate_locked(&mut state, index).await;
            if let Err(e) = self.active_store.save(&state.active) {
                self.revert_activation(&mut state, index);
                self.publish(&state);
                drop(state);
                self.notify_change();
                return Err(e);
            }
        }

        self.publish(&state);
        drop(state);
        self.notify_change();
        Ok(id)
    }

    /// Deactivate if needed, then delete the plugin from disk and the map.
    pub async fn uninstall(&self, id: &str) -> Result<()> {
        if id == CORE_PLUGIN_ID {
            return Err(PluginSystemError::ProtectedPlugin(id.to_string()).into());
        }
        let mut state = self.state.lock().await;
        let index = state
            .position(id)
            .ok_or_else(|| PluginSystemError::NotFound(id.to_string()))?;

        if state.active.contains(id) {
            self.deactivate_locked(&mut state, index).await;
            if let Err(e) = self.active_store.save(&state.active) {
                self.revert_deactivation(&mut state, index);
                return Err(e);
            }
        }

        let path = state.plugins[index].path().to_path_buf();
        let removed = match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(e, "remove_plugin_dir", path.clone())),
        };
        if removed.is_ok() {
            state.plugins.remove(index);
            log::info!("Uninstalled plugin '{}'", id);
        }

        self.publish(&state);
        drop(state);
        self.notify_change();
        removed
    }

    /// Flip a plugin between active and inactive. Returns the new state.
    pub async fn toggle(&self, id: &str) -> Result<PluginState> {
        if id == CORE_PLUGIN_ID {
            return Err(PluginSystemError::ProtectedPlugin(id.to_string()).into());
        }
        let mut state = self.state.lock().await;
        let index = state
            .position(id)
            .ok_or_else(|| PluginSystemError::NotFound(id.to_string()))?;

        let was_active = state.active.contains(id);
        if was_active {
            self.deactivate_locked(&mut state, index).await;
        } else {
            self.activate_locked(&mut state, index).await;
        }

        if let Err(e) = self.active_store.save(&state.active) {
            if was_active {
                self.revert_deactivation(&mut state, index);
            } else {
                self.revert_activation(&mut state, index);
            }
            return Err(e);
        }

        let new_state = state.plugins[index].state();
        self.publish(&state);
        drop(state);
        self.notify_change();
        Ok(new_state)
    }

    // --- Queries ---

    pub async fn plugin_exists(&self, id: &str) -> bool {
        self.state.lock().await.position(id).is_some()
    }

    pub async fn get_plugin(&self, id: &str) -> Option<PluginDescriptor> {
        let state = self.state.lock().await;
        state.position(id).map(|i| state.plugins[i].clone())
    }

    /// All discovered plugins, in discovery order
    pub async fn plugins(&self) -> Vec<PluginDescriptor> {
        self.state.lock().await.plugins.clone()
    }

    /// Active plugin ids, sorted
    pub async fn active_plugins(&self) -> Vec<String> {
        self.state.lock().await.active.iter().cloned().collect()
    }

    // --- Internals ---

    /// Mark active and add to the active set first, then run the plugin's
    /// own `activated` hooks so they observe it as active.
    async fn activate_locked(&self, state: &mut RegistryState, index: usize) {
        let plugin = &mut state.plugins[index];
        log::info!("Activating plugin {}", plugin.id());
        plugin.activate();
        let id = plugin.id().to_string();
        state.active.insert(id);
        self.run_lifecycle_hooks(&state.plugins[index], ACTIVATED_HOOK, PluginState::Active)
            .await;
    }

    /// Run the plugin's own `deactivated` hooks while it is still active,
    /// then mark inactive and remove from the active set.
    async fn deactivate_locked(&self, state: &mut RegistryState, index: usize) {
        log::info!("Deactivating plugin {}", state.plugins[index].id());
        self.run_lifecycle_hooks(&state.plugins[index], DEACTIVATED_HOOK, PluginState::Active)
            .await;
        let plugin = &mut state.plugins[index];
        plugin.deactivate();
        let id = plugin.id().to_string();
        state.active.remove(&id);
    }

    fn revert_activation(&self, state: &mut RegistryState, index: usize) {
        let plugin = &mut state.plugins[index];
        plugin.deactivate();
        let id = plugin.id().to_string();
        state.active.remove(&id);
    }

    fn revert_deactivation(&self, state: &mut RegistryState, index: usize) {
        let plugin = &mut state.plugins[index];
        plugin.activate();
        let id = plugin.id().to_string();
        state.active.insert(id);
    }

    async fn run_lifecycle_hooks(&self, plugin: &PluginDescriptor, hook_name: &str, seen_as: PluginState) {
        let call = CallContext::new();
        for hook in plugin.hooks_named(hook_name) {
            if let Err(e) = run_isolated(hook, Vec::new(), seen_as, &call).await {
                log::error!("{}", e);
            }
        }
    }

    fn publish(&self, state: &RegistryState) {
        let snapshot = HookSnapshot::build(&state.plugins, &state.active);
        self.snapshots.store(Arc::new(snapshot));
    }

    fn notify_change(&self) {
        let listener = match self.on_change.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(listener) = listener {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| listener())) {
                log::error!("Plugin change listener panicked: {}", panic_message(payload));
            }
        }
    }

    /// Whether the stored list differs from the canonical form of `active`
    fn stored_differs(&self, active: &BTreeSet<String>) -> Result<bool> {
        let canonical: Vec<serde_json::Value> =
            active.iter().cloned().map(serde_json::Value::String).collect();
        Ok(self.active_store.stored_list()? != Some(serde_json::Value::Array(canonical)))
    }

    /// Immediate subdirectories of the plugins root, sorted by name
    async fn list_plugin_dirs(&self) -> Vec<PathBuf> {
        let root = &self.config.plugins_root;
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot read plugins root {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut dirs = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if entry.file_name().to_string_lossy().starts_with(STAGING_DIR_PREFIX) {
                        continue;
                    }
                    match tokio::fs::metadata(&path).await {
                        Ok(meta) if meta.is_dir() => dirs.push(path),
                        Ok(_) => {}
                        Err(e) => log::warn!("Failed to get metadata for {}: {}", path.display(), e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Error while listing {}: {}", root.display(), e);
                    break;
                }
            }
        }
        dirs.sort();
        dirs
    }

    /// Check the extractor produced exactly one directory directly inside
    /// `unpacked` and derive the plugin id from its name
    async fn validate_staged_dir(&self, archive: &Path, unpacked: &Path, staged: &Path) -> Result<String> {
        let canonical_root = tokio::fs::canonicalize(unpacked)
            .await
            .map_err(|e| Error::io(e, "canonicalize_staging_dir", unpacked.to_path_buf()))?;
        let canonical_dir = tokio::fs::canonicalize(staged)
            .await
            .map_err(|e| PluginSystemError::install(archive, format!("extracted path {} is unusable: {}", staged.display(), e)))?;

        if canonical_dir.parent() != Some(canonical_root.as_path()) || !canonical_dir.is_dir() {
            return Err(PluginSystemError::install(
                archive,
                format!("extracted path {} is not a directory inside the staging area", staged.display()),
            )
            .into());
        }
        let id = plugin_id_from_path(&canonical_dir)
            .ok_or_else(|| PluginSystemError::install(archive, "cannot derive a plugin id"))?;
        if id == CORE_PLUGIN_ID {
            return Err(PluginSystemError::install(
                archive,
                format!("'{}' is reserved for the built-in plugin", CORE_PLUGIN_ID),
            )
            .into());
        }
        Ok(id)
    }

    /// Move `staged` to `target`. An existing `target` is first parked at
    /// `park` and put back if the move fails. Returns the parked path.
    async fn swap_into_place(&self, archive: &Path, staged: &Path, target: &Path, park: &Path) -> Result<Option<PathBuf>> {
        let install_io = |message: String, e: std::io::Error| PluginSystemError::InstallError {
            archive: archive.to_path_buf(),
            message,
            source: Some(Box::new(PluginSystemErrorSource::Io(e))),
        };

        let previous = match tokio::fs::symlink_metadata(target).await {
            Ok(_) => {
                tokio::fs::rename(target, park)
                    .await
                    .map_err(|e| install_io(format!("cannot move aside {}", target.display()), e))?;
                log::info!("Replacing existing plugin directory {}", target.display());
                Some(park.to_path_buf())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(e, "inspect_plugin_dir", target.to_path_buf())),
        };

        if let Err(e) = tokio::fs::rename(staged, target).await {
            self.restore_previous(target, previous.as_deref()).await;
            return Err(install_io(format!("cannot move plugin into {}", target.display()), e).into());
        }
        Ok(previous)
    }

    /// Remove a freshly placed plugin directory and move the parked one back
    async fn restore_previous(&self, target: &Path, previous: Option<&Path>) {
        match tokio::fs::remove_dir_all(target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {}: {}", target.display(), e),
        }
        if let Some(previous) = previous {
            if let Err(e) = tokio::fs::rename(previous, target).await {
                log::error!("Could not restore previous plugin directory {}: {}", target.display(), e);
            }
        }
    }
}
