mod gateway;
pub mod plugins;
mod registry;

pub use gateway::CommandGateway;
pub use registry::CommandRouter;
