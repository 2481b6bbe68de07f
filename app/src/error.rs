use derive_more::{Display, From};

use crate::config::ConfigError;
use crate::plugins::PluginError;

/// Application-level error, aggregating the module errors.
#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    #[display("{_0}")]
    Plugin(PluginError),

    #[from]
    #[display("{_0}")]
    Config(ConfigError),

    #[from]
    #[display("{_0}")]
    Io(std::io::Error),
}

impl std::error::Error for Error {}
