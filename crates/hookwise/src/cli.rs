use hookwise_core::plugin_system::{PluginDescriptor, SnapshotLayout};
use serde_json::Value;

/// Parse positional hook arguments. Anything that is not valid JSON is
/// taken as a plain string, so `run greet Bob` works without quoting.
pub fn parse_hook_args(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect()
}

pub fn print_plugins(plugins: &[PluginDescriptor]) {
    if plugins.is_empty() {
        println!("  No plugins found.");
        return;
    }
    for plugin in plugins {
        let manifest = plugin.manifest();
        println!(
            "  - {} ({} v{}) [{}] hooks: {}, tools: {}",
            plugin.id(),
            manifest.name,
            manifest.version,
            plugin.state(),
            plugin.hooks().len(),
            plugin.tools().len()
        );
    }
}

pub fn print_layout(layout: &SnapshotLayout) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(layout)?);
    Ok(())
}
