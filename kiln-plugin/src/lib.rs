pub mod chain;
pub mod plugin;
pub mod registry;

pub use chain::PluginChain;
pub use plugin::{empty_client_handle, ClientHandle, Plugin};
pub use registry::PluginRegistry;
