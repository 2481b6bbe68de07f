use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::CommandRouter;
use crate::plugins::ReleaseInfo;

/// Request/response commands the install dialog depends on.
///
/// Every failure arrives as a displayable string, matching what a webview
/// receives from a rejected command.
pub trait CommandGateway: Send + Sync + 'static {
    /// `get_plugin_release_info_cmd`
    fn get_plugin_release_info(
        &self,
        release_repo: String,
    ) -> impl Future<Output = Result<ReleaseInfo, String>> + Send;

    /// `install_plugin_cmd`; resolves once the backend has finished, but the
    /// outcome that matters is reported on the event channel.
    fn install_plugin(
        &self,
        download_url: String,
        plugin_name: String,
        sha256: Option<String>,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

impl CommandGateway for CommandRouter {
    async fn get_plugin_release_info(&self, release_repo: String) -> Result<ReleaseInfo, String> {
        let value = self
            .invoke(
                "get_plugin_release_info_cmd",
                json!({ "releaseRepo": release_repo }),
            )
            .await?;
        decode(value)
    }

    async fn install_plugin(
        &self,
        download_url: String,
        plugin_name: String,
        sha256: Option<String>,
    ) -> Result<(), String> {
        self.invoke(
            "install_plugin_cmd",
            json!({
                "downloadUrl": download_url,
                "pluginName": plugin_name,
                "sha256": sha256,
            }),
        )
        .await
        .map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}
