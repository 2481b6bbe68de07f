use std::path::{Path, PathBuf};

/// Filesystem layout used by the backend.
///
/// Production plugins live under `{data_dir}/plugins`; development checkouts
/// are discovered under the dev roots (relative to the working directory by
/// default).
#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
    dev_plugin_roots: Vec<PathBuf>,
}

impl AppPaths {
    /// Layout rooted at `data_dir`, with dev roots derived from the working directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            dev_plugin_roots: default_dev_roots(),
        }
    }

    /// Per-user data directory (e.g. `~/.local/share/textlingo` on Linux).
    pub fn default_for_user() -> Option<Self> {
        directories::ProjectDirs::from("com", "openkoto", "TextLingo")
            .map(|dirs| Self::new(dirs.data_dir()))
    }

    /// Replace the development plugin roots.
    pub fn with_dev_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.dev_plugin_roots = roots;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir.join("plugins")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn dev_plugin_roots(&self) -> &[PathBuf] {
        &self.dev_plugin_roots
    }
}

/// `../plugins`, `../../plugins` and `./plugins` relative to the working directory.
fn default_dev_roots() -> Vec<PathBuf> {
    match std::env::current_dir() {
        Ok(cwd) => vec![
            cwd.join("../plugins"),
            cwd.join("../../plugins"),
            cwd.join("plugins"),
        ],
        Err(e) => {
            log::warn!("Cannot resolve working directory for dev plugins: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_rooted_at_data_dir() {
        let paths = AppPaths::new("/tmp/textlingo").with_dev_roots(vec![]);

        assert_eq!(paths.plugins_dir(), PathBuf::from("/tmp/textlingo/plugins"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/textlingo/config.json"));
        assert!(paths.dev_plugin_roots().is_empty());
    }

    #[test]
    fn test_default_for_user_layout() {
        // No home directory in some sandboxes
        let Some(paths) = AppPaths::default_for_user() else {
            return;
        };

        assert!(paths.data_dir().is_absolute());
        assert!(paths.plugins_dir().ends_with("plugins"));
        assert!(paths.config_file().ends_with("config.json"));
        assert_eq!(paths.dev_plugin_roots().len(), default_dev_roots().len());
    }
}
