#![cfg(test)]

use serde_json::json;

use crate::kernel::constants::CORE_PLUGIN_ID;
use crate::kernel::error::Result;
use crate::plugin_system::registry::PluginRegistry;

use super::super::common::{hook_decl, recording_hook, tool_decl, CallLog, TestHost};

/// Every indexed hook and tool belongs to an active plugin, and every
/// active plugin's hooks and tools are indexed
async fn assert_index_matches_active_set(registry: &PluginRegistry) {
    let active = registry.active_plugins().await;
    let layout = registry.snapshot().layout();

    for entries in layout.hooks.values() {
        for entry in entries {
            assert!(active.contains(&entry.plugin_id), "orphaned hook from {}", entry.plugin_id);
        }
    }
    for tool in &layout.tools {
        assert!(active.contains(&tool.plugin_id), "orphaned tool from {}", tool.plugin_id);
    }

    for plugin in registry.plugins().await {
        let is_active = active.contains(&plugin.id().to_string());
        assert_eq!(plugin.is_active(), is_active, "state of {} disagrees with active set", plugin.id());
        for hook in plugin.hooks() {
            let indexed = layout
                .hooks
                .get(hook.name())
                .is_some_and(|list| list.iter().any(|e| e.plugin_id == plugin.id() && e.function == hook.function_name()));
            assert_eq!(indexed, is_active, "{}::{} indexing", plugin.id(), hook.name());
        }
    }
}

fn seed(host: &TestHost) -> CallLog {
    let log = CallLog::new();
    for id in ["weather", "news"] {
        host.catalog.register_hook(id, "on_ready", recording_hook(&log, id));
        host.catalog
            .register_tool(id, "lookup", crate::hook_system::function::tool_fn(|input, _ctx| Ok(input)));
        host.add_plugin(id, vec![hook_decl("on_ready", 1), tool_decl("lookup", "Look something up")]);
    }
    host.catalog.register_hook(CORE_PLUGIN_ID, "on_ready", recording_hook(&log, CORE_PLUGIN_ID));
    host.add_core_declarations(vec![hook_decl("on_ready", 100)]);
    log
}

#[tokio::test]
async fn test_double_toggle_restores_everything() -> Result<()> {
    let host = TestHost::new();
    seed(&host);
    host.set_active(&["news"]);
    let registry = host.registry();
    registry.discover().await?;

    for id in ["weather", "news"] {
        let before_layout = registry.snapshot().layout();
        let before_stored = host.stored_active();
        let before_state = registry.get_plugin(id).await.map(|p| p.state());

        registry.toggle(id).await?;
        assert_ne!(registry.get_plugin(id).await.map(|p| p.state()), before_state);
        registry.toggle(id).await?;

        assert_eq!(registry.get_plugin(id).await.map(|p| p.state()), before_state);
        assert_eq!(registry.snapshot().layout(), before_layout);
        assert_eq!(host.stored_active(), before_stored);
        assert_eq!(
            serde_json::to_string(&registry.snapshot().layout()).expect("layout serializes"),
            serde_json::to_string(&before_layout).expect("layout serializes")
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_index_tracks_active_set_through_every_operation() -> Result<()> {
    let host = TestHost::new();
    seed(&host);
    host.set_active(&["weather"]);
    let registry = host.registry();

    registry.discover().await?;
    assert_index_matches_active_set(&registry).await;

    registry.toggle("news").await?;
    assert_index_matches_active_set(&registry).await;

    registry.toggle("weather").await?;
    assert_index_matches_active_set(&registry).await;

    registry.uninstall("news").await?;
    assert_index_matches_active_set(&registry).await;

    registry.discover().await?;
    assert_index_matches_active_set(&registry).await;
    assert_eq!(host.stored_active(), Some(json!([CORE_PLUGIN_ID])));
    Ok(())
}

#[tokio::test]
async fn test_core_uninstall_leaves_state_untouched() -> Result<()> {
    let host = TestHost::new();
    seed(&host);
    host.set_active(&["weather"]);
    let registry = host.registry();
    registry.discover().await?;

    let plugins_before: Vec<String> = registry.plugins().await.iter().map(|p| p.id().to_string()).collect();
    let active_before = registry.active_plugins().await;
    let layout_before = registry.snapshot().layout();

    for _ in 0..3 {
        assert!(registry.uninstall(CORE_PLUGIN_ID).await.is_err());
    }

    let plugins_after: Vec<String> = registry.plugins().await.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(plugins_after, plugins_before);
    assert_eq!(registry.active_plugins().await, active_before);
    assert_eq!(registry.snapshot().layout(), layout_before);
    Ok(())
}

#[tokio::test]
async fn test_tools_follow_active_set() -> Result<()> {
    let host = TestHost::new();
    seed(&host);
    let registry = host.registry();
    registry.discover().await?;
    assert!(registry.tools().is_empty());

    registry.toggle("weather").await?;
    let tools = registry.tools();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].plugin_id(), "weather");
    assert_eq!(tools[0].description(), "Look something up");
    Ok(())
}
