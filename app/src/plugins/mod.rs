mod catalog;
mod dialog;
mod error;
pub mod events;
mod install_state;
mod installer;
mod manager;
mod metadata;
mod release;

pub use catalog::{
    asset_prefix_for_repo, builtin_plugin, executable_name, platform_asset_name,
    validate_plugin_name, BuiltinPlugin,
};
pub use dialog::{CompletionCallback, InstallDialog, COMPLETION_DELAY};
pub use error::PluginError;
pub use events::{InstallProgress, InstallStage};
pub use install_state::{
    format_file_size, InstallAction, InstallEvent, InstallState, InstallStateManager, InstallView,
    TransitionRejection, TransitionResult,
};
pub use installer::PluginInstaller;
pub use manager::{ExecutionCommand, PluginManager};
pub use metadata::{PluginEntryPoint, PluginInfo, PluginMetadata, PluginMode};
pub use release::{ReleaseClient, ReleaseInfo, DEFAULT_API_BASE};
