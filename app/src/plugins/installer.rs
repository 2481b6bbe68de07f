use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use sha2::{Digest, Sha256};
use textlingo_event_channel::{Event, EventChannel};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::catalog::{executable_name, manifest_for, validate_plugin_name};
use super::{InstallProgress, InstallStage, PluginError, PluginMetadata, PluginMode};

/// Minimum interval between two `downloading` progress events
const PROGRESS_EMIT_INTERVAL: Duration = Duration::from_millis(100);
/// Reported while the content length is unknown
const UNKNOWN_LENGTH_PROGRESS: f64 = 0.5;
const INSTALLING_PROGRESS: f64 = 0.9;

/// Downloads plugin executables into the plugins directory and reports
/// progress on the `plugin-install-progress` topic.
///
/// Installs are single-flight per plugin name.
pub struct PluginInstaller {
    plugins_dir: PathBuf,
    http: reqwest::Client,
    events: EventChannel,
    /// Plugins with an install in flight
    installing: Arc<Mutex<HashSet<String>>>,
}

impl PluginInstaller {
    pub fn new(plugins_dir: impl Into<PathBuf>, events: EventChannel) -> Result<Self, PluginError> {
        let http = reqwest::Client::builder()
            .user_agent("OpenKoto-Desktop")
            .build()?;

        Ok(Self {
            plugins_dir: plugins_dir.into(),
            http,
            events,
            installing: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn is_installing(&self, plugin_name: &str) -> bool {
        self.installing.lock().unwrap().contains(plugin_name)
    }

    /// Download and install `plugin_name` from `download_url`.
    ///
    /// Emits `downloading`, `installing` and `completed` events; any failure
    /// emits a single `failed` event carrying the error text before the error
    /// is returned. An invalid plugin name, or a second install of a plugin
    /// already in flight, is rejected without emitting anything.
    pub async fn install(
        &self,
        download_url: &str,
        plugin_name: &str,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf, PluginError> {
        if let Err(e) = validate_plugin_name(plugin_name) {
            warn!("Refusing to install: {}", e);
            return Err(e);
        }

        {
            let mut installing = self.installing.lock().unwrap();
            if !installing.insert(plugin_name.to_string()) {
                warn!("Plugin '{}' is already being installed", plugin_name);
                return Err(PluginError::AlreadyInstalling(plugin_name.to_string()));
            }
        }

        info!("Installing plugin '{}' from {}", plugin_name, download_url);

        let result = self
            .install_inner(download_url, plugin_name, expected_sha256)
            .await;

        self.installing.lock().unwrap().remove(plugin_name);

        match &result {
            Ok(exe_path) => {
                info!("Plugin '{}' installed at {:?}", plugin_name, exe_path);
                self.emit(InstallProgress::new(
                    InstallStage::Completed,
                    1.0,
                    "Installation complete",
                ));
            }
            Err(e) => {
                error!("Plugin '{}' install failed: {}", plugin_name, e);
                self.emit(InstallProgress::failed(e.to_string()));
            }
        }

        result
    }

    async fn install_inner(
        &self,
        download_url: &str,
        plugin_name: &str,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf, PluginError> {
        let plugin_dir = self.plugins_dir.join(plugin_name);
        let created_dir = !tokio::fs::try_exists(&plugin_dir).await?;
        tokio::fs::create_dir_all(&plugin_dir).await?;

        let result = self
            .install_into(&plugin_dir, download_url, plugin_name, expected_sha256)
            .await;

        if result.is_err() && created_dir {
            if let Err(e) = tokio::fs::remove_dir_all(&plugin_dir).await {
                warn!("Failed to remove {:?}: {}", plugin_dir, e);
            }
        }

        result
    }

    async fn install_into(
        &self,
        plugin_dir: &Path,
        download_url: &str,
        plugin_name: &str,
        expected_sha256: Option<&str>,
    ) -> Result<PathBuf, PluginError> {
        self.emit(InstallProgress::new(
            InstallStage::Downloading,
            0.0,
            "Downloading plugin...",
        ));

        let manifest = manifest_for(plugin_name);
        let exe_path = plugin_dir.join(installed_executable_name(&manifest));
        let partial_path = partial_path_for(&exe_path);

        if let Err(e) = self.download_with_progress(download_url, &partial_path).await {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(e);
        }

        self.emit(InstallProgress::new(
            InstallStage::Installing,
            INSTALLING_PROGRESS,
            "Installing...",
        ));

        if let Some(expected) = expected_sha256 {
            if let Err(e) = verify_checksum(&partial_path, expected).await {
                let _ = tokio::fs::remove_file(&partial_path).await;
                return Err(e);
            }
            debug!("Checksum verified for '{}'", plugin_name);
        }

        tokio::fs::rename(&partial_path, &exe_path).await?;
        make_executable(&exe_path).await?;

        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(plugin_dir.join("plugin.json"), manifest_json).await?;

        Ok(exe_path)
    }

    /// Stream `url` into `dest_path`, emitting throttled progress events.
    async fn download_with_progress(&self, url: &str, dest_path: &Path) -> Result<(), PluginError> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(PluginError::HttpStatus {
                context: "Download",
                status: response.status(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);

        let file = tokio::fs::File::create(dest_path).await?;
        let mut file = tokio::io::BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut last_emit = Instant::now();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            // Emit every 100ms to avoid flooding listeners
            if last_emit.elapsed() >= PROGRESS_EMIT_INTERVAL {
                self.emit_download_progress(downloaded, total_size);
                last_emit = Instant::now();
            }
        }

        file.flush().await?;
        self.emit_download_progress(downloaded, total_size);

        debug!("Downloaded {} bytes into {:?}", downloaded, dest_path);
        Ok(())
    }

    fn emit_download_progress(&self, downloaded: u64, total_size: u64) {
        let progress = download_fraction(downloaded, total_size);
        self.emit(InstallProgress::new(
            InstallStage::Downloading,
            progress,
            format!("Downloading... {:.1}%", progress * 100.0),
        ));
    }

    fn emit(&self, progress: InstallProgress) {
        if let Err(e) = progress.emit(&self.events) {
            warn!("Failed to emit install progress: {}", e);
        }
    }
}

fn download_fraction(downloaded: u64, total_size: u64) -> f64 {
    if total_size > 0 {
        downloaded as f64 / total_size as f64
    } else {
        UNKNOWN_LENGTH_PROGRESS
    }
}

/// `./name` in the prod entry point becomes `name` (plus `.exe` on Windows).
///
/// Falls back to the plugin name when the entry point does not name a file
/// directly inside the plugin directory.
fn installed_executable_name(manifest: &PluginMetadata) -> String {
    let command = manifest
        .entry_point(PluginMode::Prod)
        .map(|e| e.command.as_str())
        .unwrap_or(manifest.name.as_str());
    let command = command.strip_prefix("./").unwrap_or(command);

    if validate_plugin_name(command).is_ok() {
        executable_name(command)
    } else {
        executable_name(&manifest.name)
    }
}

fn partial_path_for(exe_path: &Path) -> PathBuf {
    let mut name = exe_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Verify SHA-256 checksum of a downloaded file.
async fn verify_checksum(file_path: &Path, expected_hash: &str) -> Result<(), PluginError> {
    let mut file = tokio::fs::File::open(file_path).await?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024]; // 1MB buffer

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let computed_hash = format!("{:x}", hasher.finalize());
    if !computed_hash.eq_ignore_ascii_case(expected_hash) {
        return Err(PluginError::ChecksumMismatch {
            expected: expected_hash.to_string(),
            actual: computed_hash,
        });
    }

    Ok(())
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), PluginError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o755);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), PluginError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_fraction() {
        assert_eq!(download_fraction(50, 200), 0.25);
        assert_eq!(download_fraction(200, 200), 1.0);
        assert_eq!(download_fraction(12345, 0), UNKNOWN_LENGTH_PROGRESS);
    }

    #[test]
    fn test_installed_executable_name_follows_prod_entry_point() {
        let name = installed_executable_name(&manifest_for("openkoto-pdf-translator"));
        assert_eq!(name, executable_name("openkoto-pdf-translator"));

        let name = installed_executable_name(&manifest_for("subtitle-aligner"));
        assert_eq!(name, executable_name("subtitle-aligner"));
    }

    #[test]
    fn test_executable_name_stays_inside_plugin_dir() {
        let mut manifest = manifest_for("tool");
        manifest.entry_points.get_mut("prod").unwrap().command = "./../../x".into();

        assert_eq!(installed_executable_name(&manifest), executable_name("tool"));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path_for(Path::new("/p/tool")),
            PathBuf::from("/p/tool.partial")
        );
    }

    #[tokio::test]
    async fn test_verify_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        tokio::fs::write(&path, b"hello").await.unwrap();

        // sha256("hello")
        let good = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        verify_checksum(&path, good).await.unwrap();
        verify_checksum(&path, &good.to_uppercase()).await.unwrap();

        let err = verify_checksum(&path, "00").await.unwrap_err();
        assert!(matches!(err, PluginError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_invalid_names_never_touch_the_filesystem() {
        let root = tempfile::tempdir().unwrap();
        let plugins_dir = root.path().join("data").join("plugins");
        let events = EventChannel::new();
        let installer = PluginInstaller::new(&plugins_dir, events.clone()).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let _subscription = InstallProgress::listen(&events, move |p| {
            sink.lock().unwrap().push(p);
        });

        let absolute = root.path().join("absolute");
        let absolute = absolute.to_string_lossy().into_owned();

        for name in ["../../escaped", absolute.as_str(), "", "a/b"] {
            let err = installer
                .install("http://127.0.0.1:9/none", name, None)
                .await
                .unwrap_err();
            assert!(matches!(err, PluginError::InvalidName(_)), "{:?}", name);
            assert!(!installer.is_installing(name));
        }

        assert!(!root.path().join("escaped").exists());
        assert!(!root.path().join("absolute").exists());
        assert!(!plugins_dir.exists());
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_install_removes_new_plugin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let installer = PluginInstaller::new(dir.path(), EventChannel::new()).unwrap();

        // Nothing listens on the discard port, so the download fails
        installer
            .install("http://127.0.0.1:9/none", "tool", None)
            .await
            .unwrap_err();
        assert!(!dir.path().join("tool").exists());

        // A directory that existed before the install is left alone
        let existing = dir.path().join("kept");
        std::fs::create_dir_all(&existing).unwrap();
        std::fs::write(existing.join("notes.txt"), b"keep me").unwrap();
        installer
            .install("http://127.0.0.1:9/none", "kept", None)
            .await
            .unwrap_err();
        assert!(existing.join("notes.txt").is_file());
    }

    #[tokio::test]
    async fn test_second_install_is_rejected_while_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let installer = PluginInstaller::new(dir.path(), EventChannel::new()).unwrap();

        installer
            .installing
            .lock()
            .unwrap()
            .insert("openkoto-pdf-translator".into());

        let err = installer
            .install("http://127.0.0.1:9/none", "openkoto-pdf-translator", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::AlreadyInstalling(_)));
        assert!(installer.is_installing("openkoto-pdf-translator"));
    }
}
