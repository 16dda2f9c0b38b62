#![cfg(test)]

use std::sync::Arc;

use tempfile::tempdir;

use crate::kernel::bootstrap::Application;
use crate::kernel::constants::CORE_PLUGIN_ID;
use crate::kernel::error::Result;
use crate::plugin_system::descriptor::PluginState;
use crate::storage::config::HostConfig;
use crate::storage::settings::{JsonFileSettingsStore, SettingsStore};

use super::super::common::write_plugin;

#[tokio::test]
async fn test_active_set_survives_restart() -> Result<()> {
    let home = tempdir().expect("Failed to create temp directory");
    let config = HostConfig::from_dir(home.path());
    write_plugin(&config.plugins_root, "weather", vec![]);
    write_plugin(&config.plugins_root, "news", vec![]);

    {
        let mut app = Application::new(config.clone());
        app.start().await?;
        assert_eq!(app.registry().toggle("weather").await?, PluginState::Active);
    }

    let mut restarted = Application::new(config.clone());
    restarted.start().await?;
    assert_eq!(
        restarted.registry().active_plugins().await,
        vec![CORE_PLUGIN_ID.to_string(), "weather".to_string()]
    );

    let store = JsonFileSettingsStore::new(&config.settings_path);
    assert_eq!(
        store.get("active_plugins")?,
        Some(serde_json::json!([CORE_PLUGIN_ID, "weather"]))
    );
    Ok(())
}

#[tokio::test]
async fn test_other_settings_are_preserved() -> Result<()> {
    let home = tempdir().expect("Failed to create temp directory");
    let config = HostConfig::from_dir(home.path());
    write_plugin(&config.plugins_root, "weather", vec![]);
    let store = Arc::new(JsonFileSettingsStore::new(&config.settings_path));
    store.upsert("theme", serde_json::json!("dark"))?;

    let mut app = Application::with_store(config.clone(), store.clone());
    app.start().await?;
    app.registry().toggle("weather").await?;

    let reopened = JsonFileSettingsStore::new(&config.settings_path);
    assert_eq!(reopened.get("theme")?, Some(serde_json::json!("dark")));
    Ok(())
}
