//! # Hookwise Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], covering per-plugin load failures and the
//! failures of administrative registry operations (toggle, install,
//! uninstall). Load failures are contained by the registry and logged;
//! administrative failures are returned to the caller of that operation.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin loading failed for '{plugin_id}' at '{}': {source}", path.display())]
    LoadError {
        plugin_id: String,
        path: PathBuf,
        #[source]
        source: Box<PluginSystemErrorSource>,
    },

    #[error("Plugin '{0}' not present in plugins folder")]
    NotFound(String),

    #[error("Plugin '{0}' is built in and cannot be uninstalled or deactivated")]
    ProtectedPlugin(String),

    #[error("Plugin install from '{}' failed: {message}", archive.display())]
    InstallError {
        archive: PathBuf,
        message: String,
        #[source]
        source: Option<Box<PluginSystemErrorSource>>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemErrorSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Other: {0}")]
    Other(String),
}

impl PluginSystemError {
    pub fn load(plugin_id: impl Into<String>, path: impl Into<PathBuf>, source: impl Into<PluginSystemErrorSource>) -> Self {
        PluginSystemError::LoadError {
            plugin_id: plugin_id.into(),
            path: path.into(),
            source: Box::new(source.into()),
        }
    }

    pub fn install(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PluginSystemError::InstallError {
            archive: archive.into(),
            message: message.into(),
            source: None,
        }
    }
}

impl From<String> for PluginSystemErrorSource {
    fn from(message: String) -> Self {
        PluginSystemErrorSource::Other(message)
    }
}
