use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plugins::PluginMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type-safe configuration key that associates a key name with its value type
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> ConfigKey<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name
    }
}

// ===== Plugin Configuration =====

/// Which instance of each plugin is active (stored locally)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// plugin name -> active mode
    #[serde(default)]
    pub modes: HashMap<String, PluginMode>,
}

impl ConfigKey<PluginConfig> {
    pub const PLUGINS: Self = Self::new("pluginConfig");
}

// ===== Type-Safe Config Store =====

pub trait ConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T>;
    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError>;
    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError>;
}

/// JSON-file backed configuration store. Every write is persisted immediately.
#[derive(Debug, Clone)]
pub struct Config {
    path: Arc<PathBuf>,
    values: Arc<Mutex<Map<String, Value>>>,
}

impl Config {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        let values = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content)?
        } else {
            Map::new()
        };

        log::debug!("Config store opened at {:?} ({} keys)", path, values.len());

        Ok(Self {
            path: Arc::new(path),
            values: Arc::new(Mutex::new(values)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.to_path_buf(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(self.path.as_path(), content).map_err(io_err)
    }
}

impl ConfigStore for Config {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        self.values
            .lock()
            .unwrap()
            .get(key.key_name())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError> {
        let val = serde_json::to_value(value)?;
        let mut values = self.values.lock().unwrap();
        values.insert(key.key_name().to_string(), val);
        self.persist(&values)
    }

    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError> {
        let mut values = self.values.lock().unwrap();
        values.remove(key.key_name());
        self.persist(&values)
    }
}

/// Load the plugin configuration, falling back to defaults.
pub fn load_plugin_config(store: &impl ConfigStore) -> PluginConfig {
    store.get(&ConfigKey::PLUGINS).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    // Simple in-memory mock store for testing
    struct MockConfigStore {
        data: RefCell<HashMap<String, Value>>,
    }

    impl MockConfigStore {
        fn new() -> Self {
            Self {
                data: RefCell::new(HashMap::new()),
            }
        }
    }

    impl ConfigStore for MockConfigStore {
        fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
            self.data
                .borrow()
                .get(key.key_name())
                .and_then(|v| serde_json::from_value(v.clone()).ok())
        }

        fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), ConfigError> {
            let val = serde_json::to_value(value)?;
            self.data
                .borrow_mut()
                .insert(key.key_name().to_string(), val);
            Ok(())
        }

        fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), ConfigError> {
            self.data.borrow_mut().remove(key.key_name());
            Ok(())
        }
    }

    fn modes(entries: &[(&str, PluginMode)]) -> PluginConfig {
        PluginConfig {
            modes: entries
                .iter()
                .map(|(name, mode)| (name.to_string(), *mode))
                .collect(),
        }
    }

    #[test]
    fn test_plugin_config_store() {
        let test_cases = vec![
            ("PluginConfig empty", PluginConfig::default()),
            (
                "PluginConfig with a dev plugin",
                modes(&[("openkoto-pdf-translator", PluginMode::Dev)]),
            ),
            (
                "PluginConfig with mixed modes",
                modes(&[
                    ("openkoto-pdf-translator", PluginMode::Prod),
                    ("subtitle-aligner", PluginMode::Dev),
                ]),
            ),
        ];

        for (description, config) in test_cases {
            let store = MockConfigStore::new();
            test_config_lifecycle(&store, &ConfigKey::PLUGINS, config, description);
        }
    }

    #[test]
    fn test_load_plugin_config_defaults_when_missing() {
        let store = MockConfigStore::new();
        assert_eq!(load_plugin_config(&store), PluginConfig::default());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = Config::open(&path).unwrap();
        store
            .set(
                &ConfigKey::PLUGINS,
                modes(&[("openkoto-pdf-translator", PluginMode::Dev)]),
            )
            .unwrap();

        let reopened = Config::open(&path).unwrap();
        let config = load_plugin_config(&reopened);
        assert_eq!(
            config.modes.get("openkoto-pdf-translator"),
            Some(&PluginMode::Dev)
        );

        reopened.delete(&ConfigKey::PLUGINS).unwrap();
        let reopened = Config::open(&path).unwrap();
        assert!(reopened.get::<PluginConfig>(&ConfigKey::PLUGINS).is_none());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::open(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_legacy_mode_names_are_accepted() {
        let store = MockConfigStore::new();
        store.data.borrow_mut().insert(
            "pluginConfig".to_string(),
            serde_json::json!({ "modes": { "openkoto-pdf-translator": "Dev" } }),
        );

        let config = load_plugin_config(&store);
        assert_eq!(
            config.modes.get("openkoto-pdf-translator"),
            Some(&PluginMode::Dev)
        );
    }

    // Helper function to check if a string is in camelCase format
    fn is_camel_case(s: &str) -> bool {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) if first.is_ascii_lowercase() => chars.all(|c| c.is_alphanumeric()),
            _ => false,
        }
    }

    // Helper function to verify camelCase format dynamically
    fn verify_camel_case<T>(store: &MockConfigStore, key: &ConfigKey<T>) {
        assert!(
            is_camel_case(key.key_name()),
            "Config key '{}' should be camelCase",
            key.key_name()
        );

        let stored_json = store.data.borrow().get(key.key_name()).cloned();
        if let Some(obj) = stored_json.as_ref().and_then(Value::as_object) {
            for field_key in obj.keys() {
                assert!(
                    is_camel_case(field_key),
                    "Field '{}' in {} should be camelCase",
                    field_key,
                    key.key_name()
                );
            }
        }
    }

    // Helper function to test the full lifecycle of a config
    fn test_config_lifecycle<T>(
        store: &MockConfigStore,
        key: &ConfigKey<T>,
        test_config: T,
        description: &str,
    ) where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug + Clone,
    {
        let result: Option<T> = store.get(key);
        assert!(
            result.is_none(),
            "{}: Get should return None before set",
            description
        );

        store
            .set(key, test_config.clone())
            .unwrap_or_else(|e| panic!("{}: Set should succeed: {}", description, e));

        let result: Option<T> = store.get(key);
        assert_eq!(
            result.as_ref(),
            Some(&test_config),
            "{}: Retrieved config should match",
            description
        );

        verify_camel_case(store, key);

        store
            .delete(key)
            .unwrap_or_else(|e| panic!("{}: Delete should succeed: {}", description, e));

        let result: Option<T> = store.get(key);
        assert!(
            result.is_none(),
            "{}: Get should return None after delete",
            description
        );
    }
}
