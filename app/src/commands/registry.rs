use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::plugins;
use crate::setup::Backend;

/// Single source of truth for all commands
/// This macro takes a wrapper macro path and applies it to the command list
#[macro_export]
macro_rules! with_commands {
    ($($wrapper:tt)*) => {
        $($wrapper)*! {
            // Release lookup and install
            get_plugin_release_info_cmd,
            install_plugin_cmd,
            // Installed plugins
            list_plugins_cmd,
            set_plugin_mode_cmd,
            get_plugin_modes_cmd,
            check_plugin_installed_cmd,
            get_plugins_directory_cmd,
        }
    };
}

/// Generates the name -> handler dispatch for every listed command
macro_rules! command_dispatch {
    [$($command:ident),* $(,)?] => {
        /// Every command name `invoke` understands
        pub const COMMANDS: &'static [&'static str] = &[$(stringify!($command)),*];

        /// Run command `name` with webview-style JSON arguments.
        ///
        /// Arguments use camelCase keys; `null` stands for "no arguments".
        /// Every failure is rendered to a string.
        pub async fn invoke(&self, name: &str, args: Value) -> Result<Value, String> {
            debug!("invoke {}", name);
            let result = match name {
                $(stringify!($command) => call(name, &self.backend, args, plugins::$command).await,)*
                _ => Err(format!("Unknown command: {}", name)),
            };
            if let Err(e) = &result {
                warn!("{} failed: {}", name, e);
            }
            result
        }
    };
}

/// In-process command gateway.
///
/// Commands are addressed by name and exchange JSON, the same contract a
/// webview front end sees.
#[derive(Clone)]
pub struct CommandRouter {
    backend: Arc<Backend>,
}

impl CommandRouter {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    with_commands!(command_dispatch);
}

async fn call<'b, A, T, F, Fut>(
    name: &str,
    backend: &'b Backend,
    args: Value,
    command: F,
) -> Result<Value, String>
where
    A: DeserializeOwned,
    T: Serialize,
    F: FnOnce(&'b Backend, A) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };

    let args: A = serde_json::from_value(args)
        .map_err(|e| format!("Invalid arguments for {}: {}", name, e))?;

    let output = command(backend, args).await?;
    serde_json::to_value(output).map_err(|e| e.to_string())
}
