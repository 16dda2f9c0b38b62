/// Application name
pub const APP_NAME: &str = "Hookwise";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reserved id of the built-in plugin bundled with the host
pub const CORE_PLUGIN_ID: &str = "core_plugin";

/// Settings key holding the list of active plugin ids
pub const ACTIVE_PLUGINS_KEY: &str = "active_plugins";

/// Manifest file name inside a plugin directory
pub const MANIFEST_FILE: &str = "plugin.json";

/// Extension of declaration units inside a plugin directory
pub const DECLARATION_EXTENSION: &str = "json";

/// Priority given to hook declarations that do not set one
pub const DEFAULT_HOOK_PRIORITY: i32 = 1;

/// Hook run on a plugin right after it becomes active
pub const ACTIVATED_HOOK: &str = "activated";

/// Hook run on a plugin right before it becomes inactive
pub const DEACTIVATED_HOOK: &str = "deactivated";

/// Subdirectories of a plugin that are never scanned for declarations
pub const EXCLUDED_SCAN_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
];

/// Name prefix of the per-install staging directory inside the plugins root.
/// Directories carrying it are never discovered as plugins.
pub const STAGING_DIR_PREFIX: &str = ".hookwise-install-";

/// Default plugins directory, relative to the host home
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Default built-in plugin directory, relative to the host home
pub const DEFAULT_CORE_PLUGIN_DIR: &str = "core_plugin";

/// Default settings file, relative to the host home
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";
