use std::collections::HashMap;
use std::path::{Component, Path};

use super::{PluginEntryPoint, PluginError, PluginMetadata};

/// Static information about a plugin that can be installed from a release.
/// This is hardcoded and never changes at runtime.
#[derive(Debug, Clone)]
pub struct BuiltinPlugin {
    /// Manifest written to `plugin.json` on install
    pub manifest: PluginMetadata,
    /// Prefix of the platform-specific release asset names
    pub asset_prefix: &'static str,
}

/// Hardcoded catalog of installable plugins
fn builtin_catalog() -> Vec<BuiltinPlugin> {
    vec![BuiltinPlugin {
        manifest: PluginMetadata {
            name: "openkoto-pdf-translator".into(),
            display_name: "PDF Translator".into(),
            version: "0.1.0".into(),
            description:
                "Translates local PDF documents into a translated-only or bilingual side-by-side copy."
                    .into(),
            entry_points: HashMap::from([(
                "prod".to_string(),
                PluginEntryPoint {
                    command: "./openkoto-pdf-translator".into(),
                    args: vec![],
                },
            )]),
            release_repo: "hikariming/openkoto".into(),
        },
        asset_prefix: "openkoto-pdf-translator",
    }]
}

/// Look up a catalog entry by plugin name
pub fn builtin_plugin(name: &str) -> Option<BuiltinPlugin> {
    builtin_catalog()
        .into_iter()
        .find(|p| p.manifest.name == name)
}

/// Asset prefix used by releases of `release_repo`.
///
/// Catalog entries win; otherwise the repository name is used.
pub fn asset_prefix_for_repo(release_repo: &str) -> String {
    builtin_catalog()
        .into_iter()
        .find(|p| p.manifest.release_repo == release_repo)
        .map(|p| p.asset_prefix.to_string())
        .unwrap_or_else(|| {
            release_repo
                .rsplit('/')
                .next()
                .unwrap_or(release_repo)
                .to_string()
        })
}

/// Release asset name for `plugin_prefix` on the given OS / architecture.
///
/// `os` and `arch` use the values of `std::env::consts::{OS, ARCH}`.
pub fn platform_asset_name(plugin_prefix: &str, os: &str, arch: &str) -> String {
    let suffix = match (os, arch) {
        ("macos", "aarch64") => "macos-arm64",
        ("macos", _) => "macos-x64",
        ("windows", _) => "win-x64.exe",
        ("linux", _) => "linux-x64",
        _ => return "unknown".to_string(),
    };
    format!("{}-{}", plugin_prefix, suffix)
}

/// Executable file name of an installed plugin on the current platform
pub fn executable_name(plugin_name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", plugin_name)
    } else {
        plugin_name.to_string()
    }
}

/// Reject names that are not exactly one plain path component.
///
/// Plugin names become directory names under the plugins directory, so
/// separators, `.`/`..`, absolute paths and empty names are refused.
pub fn validate_plugin_name(plugin_name: &str) -> Result<(), PluginError> {
    let mut components = Path::new(plugin_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None)
            if name == plugin_name && !plugin_name.contains(['/', '\\']) =>
        {
            Ok(())
        }
        _ => Err(PluginError::InvalidName(plugin_name.to_string())),
    }
}

/// Manifest for `plugin_name`: the catalog entry, or a minimal prod-only one.
pub(crate) fn manifest_for(plugin_name: &str) -> PluginMetadata {
    if let Some(builtin) = builtin_plugin(plugin_name) {
        return builtin.manifest;
    }

    PluginMetadata {
        name: plugin_name.to_string(),
        display_name: plugin_name.to_string(),
        version: "0.0.0".into(),
        description: String::new(),
        entry_points: HashMap::from([(
            "prod".to_string(),
            PluginEntryPoint {
                command: format!("./{}", plugin_name),
                args: vec![],
            },
        )]),
        release_repo: String::new(),
    }
}
