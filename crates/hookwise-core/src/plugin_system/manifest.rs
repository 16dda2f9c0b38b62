use serde::{Deserialize, Serialize};

/// Human-facing metadata of a plugin. Opaque to the engine: nothing in
/// discovery or dispatch depends on these values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginManifest {
    /// Human-readable name
    pub name: String,

    /// Plugin description
    pub description: String,

    /// Plugin version
    pub version: String,

    /// Plugin author
    pub author: String,

    /// Plugin website URL (optional)
    pub website: Option<String>,

    /// Tags for categorization
    pub tags: Vec<String>,
}

/// On-disk shape of `plugin.json`; every field is optional
#[derive(Deserialize, Debug, Default)]
pub(crate) struct RawPluginManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl PluginManifest {
    /// Manifest used when a plugin ships none, or an unreadable one
    pub fn default_for(plugin_id: &str) -> Self {
        Self {
            name: plugin_id.to_string(),
            description: String::new(),
            version: "0.0.0".to_string(),
            author: "Unknown".to_string(),
            website: None,
            tags: Vec::new(),
        }
    }

    pub(crate) fn from_raw(plugin_id: &str, raw: RawPluginManifest) -> Self {
        let defaults = Self::default_for(plugin_id);
        Self {
            name: raw.name.unwrap_or(defaults.name),
            description: raw.description.unwrap_or(defaults.description),
            version: raw.version.unwrap_or(defaults.version),
            author: raw.author.unwrap_or(defaults.author),
            website: raw.website,
            tags: raw.tags,
        }
    }
}
