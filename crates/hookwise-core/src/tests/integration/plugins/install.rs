#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tempfile::tempdir;

use crate::hook_system::context::CallContext;
use crate::hook_system::error::DispatchError;
use crate::kernel::constants::CORE_PLUGIN_ID;
use crate::kernel::error::{Error, Result};
use crate::plugin_system::descriptor::PluginState;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::extractor::PluginExtractor;

use super::super::common::{
    hook_decl, named_hook_decl, pack_plugin, recording_hook, write_manifest, write_plugin_units, CallLog, TestHost,
};

/// Package version `version` of a plugin built from the given units into
/// `<work>/<id>-<version>.tar.gz`
fn packaged_units(work: &tempfile::TempDir, id: &str, version: &str, units: &[(&str, Value)]) -> PathBuf {
    let source = write_plugin_units(&work.path().join(version), id, units);
    write_manifest(&source, json!({"name": id, "version": version}));
    let archive = work.path().join(format!("{}-{}.tar.gz", id, version));
    pack_plugin(&source, id, &archive);
    archive
}

fn packaged(work: &tempfile::TempDir, id: &str, declarations: Vec<Value>) -> PathBuf {
    packaged_units(work, id, "1.0.0", &[("hooks.json", Value::Array(declarations))])
}

fn is_install_error(err: &Error) -> bool {
    matches!(err.as_plugin_error(), Some(PluginSystemError::InstallError { .. }))
}

/// Names of everything directly inside `dir`, sorted
fn entries_of(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|entry| entry.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Extractor that refuses every archive
#[derive(Debug)]
struct RefusingExtractor;

impl PluginExtractor for RefusingExtractor {
    fn extract(&self, archive: &Path, _dest_root: &Path) -> std::result::Result<PathBuf, PluginSystemError> {
        Err(PluginSystemError::install(archive, "unsupported archive format"))
    }
}

/// Extractor that reports a directory it created somewhere else
#[derive(Debug)]
struct StrayExtractor {
    target: PathBuf,
}

impl PluginExtractor for StrayExtractor {
    fn extract(&self, _archive: &Path, _dest_root: &Path) -> std::result::Result<PathBuf, PluginSystemError> {
        fs::create_dir_all(&self.target).expect("Failed to create stray directory");
        fs::write(self.target.join("hooks.json"), "[]").expect("Failed to write unit");
        Ok(self.target.clone())
    }
}

#[tokio::test]
async fn test_install_extracts_loads_and_activates() -> Result<()> {
    let host = TestHost::new();
    let log = CallLog::new();
    host.catalog.register_hook("weather", "activated", recording_hook(&log, "weather::activated"));
    host.catalog.register_hook("weather", "on_ready", recording_hook(&log, "weather::on_ready"));
    let registry = host.registry();
    registry.discover().await?;

    let work = tempdir().expect("Failed to create temp directory");
    let archive = packaged(&work, "weather", vec![hook_decl("activated", 1), hook_decl("on_ready", 1)]);

    let id = registry.install(&archive).await?;

    assert_eq!(id, "weather");
    assert!(!archive.exists(), "archive should be removed after extraction");
    assert!(host.plugins_root().join("weather").join("plugin.json").is_file());
    let plugin = registry.get_plugin("weather").await.expect("weather should be registered");
    assert_eq!(plugin.state(), PluginState::Active);
    assert_eq!(plugin.manifest().version, "1.0.0");
    assert_eq!(host.stored_active(), Some(json!([CORE_PLUGIN_ID, "weather"])));

    registry.dispatcher().notify("on_ready", &CallContext::new()).await?;
    assert_eq!(log.entries(), vec!["weather::activated", "weather::on_ready"]);
    Ok(())
}

#[tokio::test]
async fn test_reinstall_of_active_plugin_keeps_it_active_once() -> Result<()> {
    let host = TestHost::new();
    let log = CallLog::new();
    host.catalog.register_hook("weather", "activated", recording_hook(&log, "activated"));
    let registry = host.registry();
    registry.discover().await?;
    let work = tempdir().expect("Failed to create temp directory");
    let units = [("hooks.json", json!([hook_decl("activated", 1)]))];

    registry.install(&packaged_units(&work, "weather", "1.0.0", &units)).await?;
    registry.install(&packaged_units(&work, "weather", "2.0.0", &units)).await?;

    assert_eq!(log.entries(), vec!["activated"]);
    let ids: Vec<String> = registry.plugins().await.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, vec![CORE_PLUGIN_ID, "weather"]);
    let weather = registry.get_plugin("weather").await.expect("weather should be registered");
    assert!(weather.is_active());
    assert_eq!(weather.manifest().version, "2.0.0");
    assert_eq!(host.stored_active(), Some(json!([CORE_PLUGIN_ID, "weather"])));
    Ok(())
}

#[tokio::test]
async fn test_reinstall_drops_units_of_previous_version() -> Result<()> {
    let host = TestHost::new();
    let log = CallLog::new();
    host.catalog.register_hook("weather", "old_hook", recording_hook(&log, "old"));
    host.catalog.register_hook("weather", "new_hook", recording_hook(&log, "new"));
    let registry = host.registry();
    registry.discover().await?;
    let work = tempdir().expect("Failed to create temp directory");
    let ctx = CallContext::new();

    let v1 = [
        ("hooks.json", json!([named_hook_decl("new_hook", "on_ready", 2)])),
        ("old.json", json!([named_hook_decl("old_hook", "on_ready", 1)])),
    ];
    registry.install(&packaged_units(&work, "weather", "1.0.0", &v1)).await?;
    registry.dispatcher().notify("on_ready", &ctx).await?;
    assert_eq!(log.entries(), vec!["new", "old"]);

    let v2 = [("hooks.json", json!([named_hook_decl("new_hook", "on_ready", 2)]))];
    registry.install(&packaged_units(&work, "weather", "2.0.0", &v2)).await?;
    registry.dispatcher().notify("on_ready", &ctx).await?;
    assert_eq!(log.entries(), vec!["new", "old", "new"]);

    let weather_dir = host.plugins_root().join("weather");
    assert!(!weather_dir.join("old.json").exists());
    assert_eq!(entries_of(host.plugins_root()), vec!["weather"]);

    // A fresh discovery sees the same thing
    registry.discover().await?;
    registry.dispatcher().notify("on_ready", &ctx).await?;
    assert_eq!(log.entries(), vec!["new", "old", "new", "new"]);
    Ok(())
}

#[tokio::test]
async fn test_failed_multi_directory_install_leaves_nothing_behind() -> Result<()> {
    let host = TestHost::new();
    let registry = host.registry();
    registry.discover().await?;

    let work = tempdir().expect("Failed to create temp directory");
    let one = write_plugin_units(work.path(), "one", &[("hooks.json", json!([]))]);
    let two = write_plugin_units(work.path(), "two", &[("hooks.json", json!([]))]);
    let archive = work.path().join("bundle.tar.gz");
    let file = fs::File::create(&archive).expect("Failed to create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all("one", &one).expect("Failed to append one");
    builder.append_dir_all("two", &two).expect("Failed to append two");
    builder
        .into_inner()
        .expect("Failed to finish tar stream")
        .finish()
        .expect("Failed to finish gzip stream");

    let err = registry.install(&archive).await.expect_err("two plugin directories must be rejected");
    assert!(is_install_error(&err), "unexpected error: {}", err);
    assert!(entries_of(host.plugins_root()).is_empty());

    registry.discover().await?;
    let ids: Vec<String> = registry.plugins().await.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, vec![CORE_PLUGIN_ID]);
    Ok(())
}

#[tokio::test]
async fn test_extractor_failure_is_install_error() -> Result<()> {
    let host = TestHost::new();
    let registry = host.registry().with_extractor(Arc::new(RefusingExtractor));
    registry.discover().await?;
    let layout_before = registry.snapshot().layout();

    let work = tempdir().expect("Failed to create temp directory");
    let archive = packaged(&work, "weather", vec![]);

    let err = registry.install(&archive).await.expect_err("install must fail");
    match err.as_plugin_error() {
        Some(PluginSystemError::InstallError { message, .. }) => {
            assert!(message.contains("unsupported"), "unexpected message: {}", message)
        }
        other => panic!("expected install error, got {:?}", other),
    }
    assert!(archive.exists(), "archive is kept when extraction fails");
    assert!(entries_of(host.plugins_root()).is_empty());
    assert!(!registry.plugin_exists("weather").await);
    assert_eq!(registry.snapshot().layout(), layout_before);
    Ok(())
}

#[tokio::test]
async fn test_extracted_directory_outside_staging_is_rejected() -> Result<()> {
    let host = TestHost::new();
    let work = tempdir().expect("Failed to create temp directory");
    let stray = StrayExtractor {
        target: work.path().join("elsewhere").join("rogue"),
    };
    let registry = host.registry().with_extractor(Arc::new(stray));
    registry.discover().await?;

    let archive = packaged(&work, "weather", vec![]);
    let err = registry.install(&archive).await.expect_err("install must fail");

    assert!(is_install_error(&err), "unexpected error: {}", err);
    assert!(!registry.plugin_exists("rogue").await);
    assert!(entries_of(host.plugins_root()).is_empty());
    assert_eq!(host.stored_active(), Some(json!([CORE_PLUGIN_ID])));
    Ok(())
}

#[tokio::test]
async fn test_install_rejects_reserved_id() -> Result<()> {
    let host = TestHost::new();
    let registry = host.registry();
    registry.discover().await?;
    let work = tempdir().expect("Failed to create temp directory");

    let err = registry
        .install(&packaged(&work, CORE_PLUGIN_ID, vec![]))
        .await
        .expect_err("reserved id must be rejected");
    assert!(is_install_error(&err), "unexpected error: {}", err);

    let ids: Vec<String> = registry.plugins().await.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, vec![CORE_PLUGIN_ID]);
    assert!(entries_of(host.plugins_root()).is_empty());
    assert!(host.config.core_plugin_dir.is_dir());
    Ok(())
}

#[tokio::test]
async fn test_failed_install_changes_nothing() -> Result<()> {
    let host = TestHost::new();
    let registry = host.registry();
    registry.discover().await?;
    let layout_before = registry.snapshot().layout();
    let stored_before = host.stored_active();

    let work = tempdir().expect("Failed to create temp directory");
    let bogus = work.path().join("bogus.tar.gz");
    fs::write(&bogus, b"not an archive").expect("Failed to write archive");

    let err = registry.install(&bogus).await.expect_err("install must fail");
    assert!(is_install_error(&err), "unexpected error: {}", err);
    assert_eq!(registry.snapshot().layout(), layout_before);
    assert_eq!(host.stored_active(), stored_before);
    assert_eq!(registry.plugins().await.len(), 1);
    assert!(entries_of(host.plugins_root()).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_uninstall_of_active_weather_plugin() -> Result<()> {
    let host = TestHost::new();
    let log = CallLog::new();
    host.catalog.register_hook("weather", "deactivated", recording_hook(&log, "weather::deactivated"));
    host.catalog.register_hook("weather", "on_ready", recording_hook(&log, "weather::on_ready"));
    host.catalog.register_hook("news", "on_ready", recording_hook(&log, "news::on_ready"));
    let weather_dir = host.add_plugin("weather", vec![hook_decl("deactivated", 1), hook_decl("on_ready", 2)]);
    host.add_plugin("news", vec![hook_decl("on_ready", 1)]);
    host.set_active(&["weather", "news"]);
    let registry = host.registry();
    registry.discover().await?;

    let ctx = CallContext::new();
    registry.dispatcher().notify("on_ready", &ctx).await?;
    assert_eq!(log.entries(), vec!["weather::on_ready", "news::on_ready"]);

    registry.uninstall("weather").await?;

    assert_eq!(
        log.entries(),
        vec!["weather::on_ready", "news::on_ready", "weather::deactivated"]
    );
    assert!(!weather_dir.exists());
    assert!(!registry.active_plugins().await.contains(&"weather".to_string()));
    assert_eq!(host.stored_active(), Some(json!([CORE_PLUGIN_ID, "news"])));

    registry.dispatcher().notify("on_ready", &ctx).await?;
    assert_eq!(log.entries().last().map(String::as_str), Some("news::on_ready"));
    assert_eq!(log.entries().iter().filter(|e| *e == "weather::on_ready").count(), 1);

    // With news gone as well, nobody implements on_ready any more
    registry.uninstall("news").await?;
    let err = registry.dispatcher().notify("on_ready", &ctx).await.expect_err("hook is gone");
    assert_eq!(err, DispatchError::UnknownHook("on_ready".to_string()));
    Ok(())
}
