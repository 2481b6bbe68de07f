//! Typesafe events for the plugins module.
//!
//! Emitted by the installer and consumed by the install dialog through the
//! event channel, using the same JSON shape a webview listener would see.

use serde::{Deserialize, Serialize};
use textlingo_event_channel::Event;

/// Coarse phase of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InstallStage {
    Downloading,
    Installing,
    Completed,
    Failed,
}

/// Plugin install progress - single event stream for every install stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub stage: InstallStage,
    /// Nominally 0.0 - 1.0; consumers clamp the derived percentage
    pub progress: f64,
    /// Displayed verbatim
    pub message: String,
}

impl InstallProgress {
    pub fn new(stage: InstallStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(InstallStage::Failed, 0.0, message)
    }
}

impl Event for InstallProgress {
    const NAME: &'static str = "plugin-install-progress";
}
