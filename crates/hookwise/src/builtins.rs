//! Functions of the built-in `core_plugin`, registered into the catalog
//! before discovery, and the declaration unit that binds them.
use std::path::Path;

use hookwise_core::kernel::constants::CORE_PLUGIN_ID;
use hookwise_core::plugin_system::FunctionCatalog;
use hookwise_core::{hook_fn, tool_fn, HookError};
use serde_json::{json, Value};

/// Declarations shipped in `<core_plugin_dir>/hooks.json`
pub fn core_declarations() -> Value {
    json!([
        {"kind": "hook", "function": "announce_ready", "hook": "on_ready", "priority": 0},
        {"kind": "hook", "function": "before_reply", "priority": 100},
        {"kind": "tool", "function": "word_count", "description": "Count the words in a piece of text"}
    ])
}

pub fn register(catalog: &FunctionCatalog) {
    catalog
        .register_hook(
            CORE_PLUGIN_ID,
            "announce_ready",
            hook_fn(|_args, ctx| {
                log::info!("{} is ready", ctx.plugin_id());
                Ok(None)
            }),
        )
        .register_hook(
            CORE_PLUGIN_ID,
            "before_reply",
            hook_fn(|args, _ctx| match args.first() {
                Some(Value::String(reply)) => Ok(Some(Value::String(reply.trim().to_string()))),
                Some(_) => Err(HookError::invalid_argument("before_reply expects a string")),
                None => Ok(None),
            }),
        )
        .register_tool(
            CORE_PLUGIN_ID,
            "word_count",
            tool_fn(|input, _ctx| {
                let text = input
                    .as_str()
                    .ok_or_else(|| HookError::invalid_argument("word_count expects a string"))?;
                Ok(json!(text.split_whitespace().count()))
            }),
        );
}

/// Write the core declaration unit when the built-in plugin directory does
/// not exist yet
pub fn seed_core_plugin(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    let manifest = json!({
        "name": "Core",
        "description": "Built-in hooks and tools",
        "version": hookwise_core::kernel::constants::APP_VERSION,
        "author": "Hookwise Developers"
    });
    std::fs::write(dir.join("plugin.json"), manifest.to_string())?;
    std::fs::write(dir.join("hooks.json"), core_declarations().to_string())?;
    log::info!("Seeded built-in plugin at {}", dir.display());
    Ok(())
}
