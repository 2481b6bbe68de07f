use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::catalog::{executable_name, validate_plugin_name};
use super::{PluginError, PluginInfo, PluginMetadata, PluginMode};
use crate::config::{load_plugin_config, Config, ConfigKey, ConfigStore};

/// Resolved command line for running a plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionCommand {
    pub command: String,
    pub args: Vec<String>,
    /// Working directory (the plugin root)
    pub working_dir: PathBuf,
}

/// A plugin directory found during a scan.
struct PluginInstance {
    info: PluginInfo,
    /// Found under a development root rather than the data directory
    is_dev_location: bool,
}

/// Discovers installed plugins and tracks which mode each one runs in.
///
/// Does NOT download anything - that's PluginInstaller's job.
pub struct PluginManager {
    plugins_dir: PathBuf,
    dev_roots: Vec<PathBuf>,
    config: Config,
}

impl PluginManager {
    pub fn new(plugins_dir: impl Into<PathBuf>, dev_roots: Vec<PathBuf>, config: Config) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            dev_roots,
            config,
        }
    }

    /// Production plugins directory, created if missing.
    pub fn plugins_dir(&self) -> Result<&Path, PluginError> {
        std::fs::create_dir_all(&self.plugins_dir)?;
        Ok(&self.plugins_dir)
    }

    /// All plugins, one instance per name, sorted by name.
    ///
    /// Dev mode prefers an instance under a development root, prod mode one
    /// under the data directory; either falls back to the first found.
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        let modes = load_plugin_config(&self.config).modes;

        let mut by_name: BTreeMap<String, Vec<PluginInstance>> = BTreeMap::new();
        for instance in self.scan_instances() {
            by_name
                .entry(instance.info.metadata.name.clone())
                .or_default()
                .push(instance);
        }

        let plugins: Vec<PluginInfo> = by_name
            .into_iter()
            .filter_map(|(name, instances)| {
                // Mode comes from the config, not from the instance
                let active_mode = modes.get(&name).copied().unwrap_or_default();
                let want_dev = active_mode == PluginMode::Dev;

                let selected = instances
                    .iter()
                    .find(|i| i.is_dev_location == want_dev)
                    .or_else(|| instances.first())?;

                debug!(
                    "Plugin '{}' mode {} -> {}",
                    name, active_mode, selected.info.path
                );

                let mut info = selected.info.clone();
                info.active_mode = active_mode;
                Some(info)
            })
            .collect();

        debug!("Resolved {} plugins", plugins.len());
        plugins
    }

    fn scan_instances(&self) -> Vec<PluginInstance> {
        let mut search_paths = vec![(self.plugins_dir.clone(), false)];
        search_paths.extend(self.dev_roots.iter().map(|root| (root.clone(), true)));

        let mut instances = Vec::new();
        for (root, is_dev_location) in search_paths {
            let Ok(entries) = std::fs::read_dir(&root) else {
                continue;
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }

                if let Some(metadata) = read_manifest(&path) {
                    instances.push(PluginInstance {
                        info: PluginInfo {
                            metadata,
                            path: path.to_string_lossy().to_string(),
                            active_mode: PluginMode::default(),
                            installed: true,
                        },
                        is_dev_location,
                    });
                }
            }
        }

        instances
    }

    /// Persist the active mode ("dev" or "prod") for `plugin_name`.
    pub fn set_plugin_mode(&self, plugin_name: &str, mode: &str) -> Result<(), PluginError> {
        validate_plugin_name(plugin_name)?;
        let mode: PluginMode = mode
            .parse()
            .map_err(|_| PluginError::InvalidMode(mode.to_string()))?;

        let mut config = load_plugin_config(&self.config);
        config.modes.insert(plugin_name.to_string(), mode);
        self.config.set(&ConfigKey::PLUGINS, config)?;

        info!("Plugin '{}' switched to {} mode", plugin_name, mode);
        Ok(())
    }

    pub fn plugin_modes(&self) -> HashMap<String, PluginMode> {
        load_plugin_config(&self.config).modes
    }

    /// True when the prod directory holds both manifest and executable, or
    /// any scanned instance carries this name.
    pub fn is_installed(&self, plugin_name: &str) -> bool {
        if validate_plugin_name(plugin_name).is_err() {
            return false;
        }

        let plugin_dir = self.plugins_dir.join(plugin_name);
        let manifest_exists = plugin_dir.join("plugin.json").exists();

        let exe_exists = read_manifest(&plugin_dir)
            .and_then(|m| prod_executable_path(&m, &plugin_dir))
            .unwrap_or_else(|| plugin_dir.join(executable_name(plugin_name)))
            .exists();

        if manifest_exists && exe_exists {
            return true;
        }

        self.list_plugins()
            .iter()
            .any(|p| p.metadata.name == plugin_name)
    }

    /// Resolve the command that runs `plugin_name` in its active mode.
    pub fn execution_command(&self, plugin_name: &str) -> Result<ExecutionCommand, PluginError> {
        let plugin = self
            .list_plugins()
            .into_iter()
            .find(|p| p.metadata.name == plugin_name)
            .ok_or_else(|| PluginError::NotFound(plugin_name.to_string()))?;

        let entry_point = plugin
            .metadata
            .entry_point(plugin.active_mode)
            .ok_or(PluginError::EntryPointMissing(plugin.active_mode))?;

        let plugin_dir = PathBuf::from(&plugin.path);
        let mut command = entry_point.command.clone();

        if plugin.active_mode == PluginMode::Prod {
            if let Some(exe_path) = prod_executable_path(&plugin.metadata, &plugin_dir) {
                if !exe_path.exists() {
                    return Err(PluginError::ExecutableMissing(exe_path));
                }
                command = exe_path.to_string_lossy().to_string();
            }
        }

        Ok(ExecutionCommand {
            command,
            args: entry_point.args.clone(),
            working_dir: plugin_dir,
        })
    }
}

/// Absolute path of a `./name` prod entry point, if the manifest uses one
/// and `name` is a file directly inside `plugin_dir`.
fn prod_executable_path(metadata: &PluginMetadata, plugin_dir: &Path) -> Option<PathBuf> {
    let command = &metadata.entry_point(PluginMode::Prod)?.command;
    let exe_name = command.strip_prefix("./")?;
    validate_plugin_name(exe_name).ok()?;
    Some(plugin_dir.join(executable_name(exe_name)))
}

fn read_manifest(plugin_dir: &Path) -> Option<PluginMetadata> {
    let json_path = plugin_dir.join("plugin.json");
    let content = std::fs::read_to_string(&json_path).ok()?;

    match serde_json::from_str(&content) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!("Ignoring invalid manifest {:?}: {}", json_path, e);
            None
        }
    }
}
