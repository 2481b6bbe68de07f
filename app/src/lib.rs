//! TextLingo plugin backend.
//!
//! Looks up plugin releases, installs plugin executables with streamed
//! progress, keeps track of installed plugins and their dev/prod mode, and
//! drives the install dialog state machine on top of the command gateway and
//! the event channel.

pub mod commands;
pub mod config;
mod error;
pub mod log;
pub mod paths;
pub mod plugins;
mod setup;

use std::sync::Arc;

pub use commands::{CommandGateway, CommandRouter};
pub use error::Error;
pub use paths::AppPaths;
pub use setup::Backend;
pub use textlingo_event_channel::{Event, EventChannel, Subscription};

/// Install the logger, build the backend and return its command router.
pub fn start(paths: AppPaths) -> Result<CommandRouter, Error> {
    crate::log::init();
    let backend = Backend::new(paths)?;
    Ok(CommandRouter::new(Arc::new(backend)))
}
