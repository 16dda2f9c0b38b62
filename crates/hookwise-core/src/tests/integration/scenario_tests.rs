#![cfg(test)]

use std::sync::Arc;

use serde_json::{json, Value};

use crate::hook_system::context::CallContext;
use crate::hook_system::error::HookError;
use crate::hook_system::function::{hook_fn, HookFunction};
use crate::kernel::bootstrap::Application;
use crate::kernel::error::Result;
use crate::storage::settings::{MemorySettingsStore, SettingsStore};

use super::common::{hook_decl, recording_hook, write_plugin, CallLog};

fn greeter(render: fn(&str) -> String) -> Arc<dyn HookFunction> {
    hook_fn(move |args, _ctx| {
        let input = args[0]
            .as_str()
            .ok_or_else(|| HookError::invalid_argument("greet expects a string"))?;
        Ok(Some(Value::String(render(input))))
    })
}

async fn greeting_app(home: &std::path::Path, active: &[&str]) -> Result<Application> {
    let config = crate::storage::config::HostConfig::from_dir(home);
    write_plugin(&config.plugins_root, "polite", vec![hook_decl("greet", 10)]);
    write_plugin(&config.plugins_root, "excited", vec![hook_decl("greet", 1)]);

    let store = Arc::new(MemorySettingsStore::new());
    store.upsert("active_plugins", json!(active))?;
    let mut app = Application::with_store(config, store);
    app.catalog()
        .register_hook("polite", "greet", greeter(|s| format!("Hi {}", s)))
        .register_hook("excited", "greet", greeter(|s| format!("Hi {}!", s)));
    app.start().await?;
    Ok(app)
}

#[tokio::test]
async fn test_greet_scenario() -> Result<()> {
    let home = tempfile::tempdir().expect("Failed to create temp directory");
    let app = greeting_app(home.path(), &["polite", "excited"]).await?;

    let ctx = CallContext::new();
    let greeting = app.dispatcher().pipe("greet", json!("Bob"), Vec::new(), &ctx).await?;
    assert_eq!(greeting, json!("Hi Hi Bob!"));

    // A non-string input fails both implementations, leaving the value as is
    let untouched = app.dispatcher().pipe("greet", json!(42), Vec::new(), &ctx).await?;
    assert_eq!(untouched, json!(42));
    Ok(())
}

#[tokio::test]
async fn test_on_ready_scenario_with_failing_plugin() -> Result<()> {
    let home = tempfile::tempdir().expect("Failed to create temp directory");
    let config = crate::storage::config::HostConfig::from_dir(home.path());
    write_plugin(&config.plugins_root, "flaky", vec![hook_decl("on_ready", 5)]);
    write_plugin(&config.plugins_root, "steady", vec![hook_decl("on_ready", 1)]);

    let log = CallLog::new();
    let store = Arc::new(MemorySettingsStore::new());
    store.upsert("active_plugins", json!(["flaky", "steady"]))?;
    let mut app = Application::with_store(config, store);
    let attempts = log.clone();
    app.catalog()
        .register_hook(
            "flaky",
            "on_ready",
            hook_fn(move |_args, _ctx| {
                attempts.push("flaky");
                Err(HookError::failed("database not reachable"))
            }),
        )
        .register_hook("steady", "on_ready", recording_hook(&log, "steady"));
    app.start().await?;

    let result = app.dispatcher().execute("on_ready", Vec::new(), &CallContext::new()).await?;
    assert_eq!(result, None);
    assert_eq!(log.entries(), vec!["flaky", "steady"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatches_see_whole_pipelines_while_toggling() -> Result<()> {
    let home = tempfile::tempdir().expect("Failed to create temp directory");
    let app = greeting_app(home.path(), &["polite", "excited"]).await?;
    let registry = Arc::clone(app.registry());

    let mut readers = Vec::new();
    for _ in 0..4 {
        let dispatcher = app.dispatcher();
        readers.push(tokio::spawn(async move {
            let ctx = CallContext::new();
            let mut seen = Vec::new();
            for _ in 0..200 {
                let value = dispatcher
                    .pipe("greet", json!("Bob"), Vec::new(), &ctx)
                    .await
                    .expect("polite stays active");
                seen.push(value);
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    for _ in 0..50 {
        registry.toggle("excited").await?;
        tokio::task::yield_now().await;
    }

    let allowed = [json!("Hi Hi Bob!"), json!("Hi Bob")];
    for reader in readers {
        let seen = reader.await.expect("reader task panicked");
        for value in seen {
            assert!(allowed.contains(&value), "observed a partial pipeline: {}", value);
        }
    }
    Ok(())
}
