use log::info;
use textlingo_event_channel::EventChannel;

use crate::config::Config;
use crate::error::Error;
use crate::paths::AppPaths;
use crate::plugins::{PluginInstaller, PluginManager, ReleaseClient};

/// Long-lived backend services shared by every command.
pub struct Backend {
    paths: AppPaths,
    events: EventChannel,
    releases: ReleaseClient,
    installer: PluginInstaller,
    manager: PluginManager,
}

impl Backend {
    /// Wire up the backend against the public release host.
    pub fn new(paths: AppPaths) -> Result<Self, Error> {
        let releases = ReleaseClient::new()?;
        Self::with_release_client(paths, releases)
    }

    /// Wire up the backend with a custom release client (mirrors, tests).
    pub fn with_release_client(paths: AppPaths, releases: ReleaseClient) -> Result<Self, Error> {
        info!("TextLingo backend v{}", env!("CARGO_PKG_VERSION"));

        let plugins_dir = paths.plugins_dir();
        std::fs::create_dir_all(&plugins_dir)?;
        info!("Plugins directory: {:?}", plugins_dir);

        let config = Config::open(paths.config_file())?;
        let events = EventChannel::new();

        let installer = PluginInstaller::new(&plugins_dir, events.clone())?;
        let manager = PluginManager::new(&plugins_dir, paths.dev_plugin_roots().to_vec(), config);

        Ok(Self {
            paths,
            events,
            releases,
            installer,
            manager,
        })
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Channel carrying `plugin-install-progress` events
    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn releases(&self) -> &ReleaseClient {
        &self.releases
    }

    pub fn installer(&self) -> &PluginInstaller {
        &self.installer
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }
}
