use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which entry point of a plugin is used.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PluginMode {
    /// Run the plugin from source (e.g. `python -m ...`)
    #[serde(alias = "Dev")]
    Dev,
    /// Run the packaged executable
    #[default]
    #[serde(alias = "Prod")]
    Prod,
}

impl PluginMode {
    /// Key of this mode in [`PluginMetadata::entry_points`].
    pub fn entry_point_key(self) -> &'static str {
        match self {
            PluginMode::Dev => "dev",
            PluginMode::Prod => "prod",
        }
    }
}

/// How to launch a plugin in one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntryPoint {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Contents of a plugin's `plugin.json` manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub description: String,
    /// Keyed by "dev" / "prod"
    pub entry_points: HashMap<String, PluginEntryPoint>,
    pub release_repo: String,
}

impl PluginMetadata {
    pub fn entry_point(&self, mode: PluginMode) -> Option<&PluginEntryPoint> {
        self.entry_points.get(mode.entry_point_key())
    }
}

/// A discovered plugin instance, as reported to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Kept nested (not flattened) so the manifest shape stays recognisable
    pub metadata: PluginMetadata,
    /// Plugin root directory
    pub path: String,
    pub active_mode: PluginMode,
    pub installed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("dev".parse::<PluginMode>().unwrap(), PluginMode::Dev);
        assert_eq!("prod".parse::<PluginMode>().unwrap(), PluginMode::Prod);
        assert!("staging".parse::<PluginMode>().is_err());
        assert_eq!(PluginMode::Dev.to_string(), "dev");
    }

    #[test]
    fn test_manifest_parses_without_args() {
        let manifest: PluginMetadata = serde_json::from_str(
            r#"{
                "name": "demo",
                "display_name": "Demo",
                "version": "0.1.0",
                "description": "",
                "entry_points": { "dev": { "command": "python" } },
                "release_repo": "owner/demo"
            }"#,
        )
        .unwrap();

        let dev = manifest.entry_point(PluginMode::Dev).unwrap();
        assert_eq!(dev.command, "python");
        assert!(dev.args.is_empty());
        assert!(manifest.entry_point(PluginMode::Prod).is_none());
    }
}
