use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::catalog::{asset_prefix_for_repo, platform_asset_name};
use super::PluginError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "OpenKoto-Desktop";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Installable plugin artifact for the current platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release tag, display only
    pub version: String,
    pub download_url: String,
    pub file_name: String,
    pub file_size_bytes: u64,
    /// Lowercase hex SHA-256 of the artifact, when the release host publishes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
    assets: Option<Vec<ReleaseAsset>>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: Option<String>,
    browser_download_url: Option<String>,
    size: Option<u64>,
    /// e.g. "sha256:1be3a9b2..."
    digest: Option<String>,
}

/// Looks up the latest release of a plugin repository.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    api_base: String,
    os: &'static str,
    arch: &'static str,
}

impl ReleaseClient {
    pub fn new() -> Result<Self, PluginError> {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Client talking to a GitHub-compatible API at `api_base`.
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, PluginError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        })
    }

    /// Pretend to run on another platform when picking release assets.
    pub fn for_platform(mut self, os: &'static str, arch: &'static str) -> Self {
        self.os = os;
        self.arch = arch;
        self
    }

    /// Fetch the latest release of `release_repo` (`owner/repo`) and pick the
    /// asset built for this platform.
    pub async fn latest_release(&self, release_repo: &str) -> Result<ReleaseInfo, PluginError> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, release_repo);
        debug!("Fetching release info from {}", url);

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PluginError::HttpStatus {
                context: "Release lookup",
                status: response.status(),
            });
        }

        let release: LatestRelease = response.json().await?;
        let asset_name = platform_asset_name(&asset_prefix_for_repo(release_repo), self.os, self.arch);

        let info = select_asset(release, &asset_name)?;
        info!(
            "Latest release of {}: {} ({}, {} bytes)",
            release_repo, info.version, info.file_name, info.file_size_bytes
        );
        Ok(info)
    }
}

fn select_asset(release: LatestRelease, asset_name: &str) -> Result<ReleaseInfo, PluginError> {
    let version = release.tag_name.unwrap_or_else(|| "unknown".to_string());

    let assets = release
        .assets
        .ok_or(PluginError::MissingField("assets"))?;

    let asset = assets
        .into_iter()
        .find(|a| a.name.as_deref().is_some_and(|n| n.contains(asset_name)))
        .ok_or_else(|| PluginError::NoMatchingAsset(asset_name.to_string()))?;

    let download_url = asset
        .browser_download_url
        .ok_or(PluginError::MissingField("browser_download_url"))?;

    let sha256 = asset
        .digest
        .and_then(|d| d.strip_prefix("sha256:").map(str::to_ascii_lowercase));

    Ok(ReleaseInfo {
        version,
        download_url,
        file_name: asset.name.unwrap_or_else(|| "plugin".to_string()),
        file_size_bytes: asset.size.unwrap_or(0),
        sha256,
    })
}
