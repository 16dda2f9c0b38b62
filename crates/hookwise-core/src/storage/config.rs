use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Filesystem layout of a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Directory whose immediate subdirectories are plugins
    pub plugins_root: PathBuf,
    /// Directory holding the built-in `core_plugin`
    pub core_plugin_dir: PathBuf,
    /// JSON file used by the default settings store
    pub settings_path: PathBuf,
}

impl HostConfig {
    pub fn new(
        plugins_root: impl Into<PathBuf>,
        core_plugin_dir: impl Into<PathBuf>,
        settings_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            plugins_root: plugins_root.into(),
            core_plugin_dir: core_plugin_dir.into(),
            settings_path: settings_path.into(),
        }
    }

    /// Conventional layout under a single home directory
    pub fn from_dir(base: &Path) -> Self {
        Self::new(
            base.join(constants::DEFAULT_PLUGINS_DIR),
            base.join(constants::DEFAULT_CORE_PLUGIN_DIR),
            base.join(constants::DEFAULT_SETTINGS_FILE),
        )
    }

    /// Load from a JSON, TOML or YAML file, picked by extension.
    /// Relative paths inside the file resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat(path.display().to_string())
        })?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| StorageSystemError::io(e, "read_config", path.to_path_buf()))?;
        let mut config = Self::parse(&content, format)?;

        if let Some(base) = path.parent() {
            config.plugins_root = resolve(base, &config.plugins_root);
            config.core_plugin_dir = resolve(base, &config.core_plugin_dir);
            config.settings_path = resolve(base, &config.settings_path);
        }
        Ok(config)
    }

    /// Deserialize from string based on format
    pub fn parse(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed: Self = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| {
                StorageSystemError::DeserializationError { format: "json".into(), source: Box::new(e) }
            }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| {
                StorageSystemError::DeserializationError { format: "yaml".into(), source: Box::new(e) }
            }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| {
                StorageSystemError::DeserializationError { format: "toml".into(), source: Box::new(e) }
            }),
        }?;
        Ok(parsed)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
