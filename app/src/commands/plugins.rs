use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use crate::plugins::{PluginInfo, PluginMode, ReleaseInfo};
use crate::setup::Backend;

/// Arguments of commands that take none
#[derive(Debug, Default, Deserialize)]
pub struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfoArgs {
    pub release_repo: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPluginArgs {
    pub download_url: String,
    pub plugin_name: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginNameArgs {
    pub plugin_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPluginModeArgs {
    pub plugin_name: String,
    pub mode: String,
}

/// Latest release of `releaseRepo` with the asset for this platform
pub async fn get_plugin_release_info_cmd(
    backend: &Backend,
    args: ReleaseInfoArgs,
) -> Result<ReleaseInfo, String> {
    backend
        .releases()
        .latest_release(&args.release_repo)
        .await
        .map_err(|e| e.to_string())
}

/// Download and install a plugin.
///
/// Progress and the terminal outcome are reported on the
/// `plugin-install-progress` topic; the returned error only repeats it.
pub async fn install_plugin_cmd(backend: &Backend, args: InstallPluginArgs) -> Result<(), String> {
    backend
        .installer()
        .install(&args.download_url, &args.plugin_name, args.sha256.as_deref())
        .await
        .map(|path| debug!("install_plugin_cmd finished: {:?}", path))
        .map_err(|e| e.to_string())
}

pub async fn list_plugins_cmd(backend: &Backend, _args: NoArgs) -> Result<Vec<PluginInfo>, String> {
    Ok(backend.manager().list_plugins())
}

pub async fn set_plugin_mode_cmd(backend: &Backend, args: SetPluginModeArgs) -> Result<(), String> {
    backend
        .manager()
        .set_plugin_mode(&args.plugin_name, &args.mode)
        .map_err(|e| e.to_string())
}

pub async fn get_plugin_modes_cmd(
    backend: &Backend,
    _args: NoArgs,
) -> Result<HashMap<String, PluginMode>, String> {
    Ok(backend.manager().plugin_modes())
}

pub async fn check_plugin_installed_cmd(
    backend: &Backend,
    args: PluginNameArgs,
) -> Result<bool, String> {
    Ok(backend.manager().is_installed(&args.plugin_name))
}

/// Plugins directory path, created if missing
pub async fn get_plugins_directory_cmd(backend: &Backend, _args: NoArgs) -> Result<String, String> {
    backend
        .manager()
        .plugins_dir()
        .map(|dir| dir.to_string_lossy().into_owned())
        .map_err(|e| e.to_string())
}
