use std::sync::Arc;

use crate::hook_system::dispatcher::HookDispatcher;
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::plugin_system::catalog::FunctionCatalog;
use crate::plugin_system::registry::PluginRegistry;
use crate::storage::config::HostConfig;
use crate::storage::settings::{JsonFileSettingsStore, SettingsStore};

/// A host's instance of the engine.
///
/// Construct it, register the functions plugins refer to in
/// [`catalog`](Self::catalog), then [`start`](Self::start) it to run the
/// initial discovery. The registry and dispatcher handles stay valid for
/// the lifetime of the application; there is no global instance.
#[derive(Debug)]
pub struct Application {
    config: HostConfig,
    catalog: Arc<FunctionCatalog>,
    registry: Arc<PluginRegistry>,
    started: bool,
}

impl Application {
    /// Application persisting its settings in the JSON file named by
    /// `config.settings_path`
    pub fn new(config: HostConfig) -> Self {
        let store = Arc::new(JsonFileSettingsStore::new(&config.settings_path));
        Self::with_store(config, store)
    }

    /// Application persisting its settings in `store`
    pub fn with_store(config: HostConfig, store: Arc<dyn SettingsStore>) -> Self {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        log::debug!("Using settings store '{}'", store.name());

        let catalog = Arc::new(FunctionCatalog::new());
        let registry = Arc::new(PluginRegistry::new(config.clone(), Arc::clone(&catalog), store));
        Self {
            config,
            catalog,
            registry,
            started: false,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Where plugin hook and tool bodies are registered
    pub fn catalog(&self) -> &Arc<FunctionCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> HookDispatcher {
        self.registry.dispatcher()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Ensure the plugins root exists and discover every plugin.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::Bootstrap("Application already started".to_string()));
        }

        let root = &self.config.plugins_root;
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| Error::io(e, "create_plugins_root", root.clone()))?;
        log::info!("Using plugins directory: {}", root.display());
        log::info!("Using built-in plugin directory: {}", self.config.core_plugin_dir.display());

        self.registry.discover().await?;
        self.started = true;
        log::info!("Application started with {} registered functions", self.catalog.len());
        Ok(())
    }
}
