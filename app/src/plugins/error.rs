use std::path::PathBuf;

use super::PluginMode;
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} failed: HTTP {status}")]
    HttpStatus {
        context: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("No plugin build found for this platform ({0})")]
    NoMatchingAsset(String),
    #[error("Release response is missing {0}")]
    MissingField(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Plugin '{0}' is already being installed")]
    AlreadyInstalling(String),
    #[error("Plugin '{0}' not found")]
    NotFound(String),
    #[error("Entry point for mode '{0}' not found")]
    EntryPointMissing(PluginMode),
    #[error("Executable not found at {0:?}")]
    ExecutableMissing(PathBuf),
    #[error("Invalid plugin name: {0:?}")]
    InvalidName(String),
    #[error("Invalid mode: {0}")]
    InvalidMode(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
