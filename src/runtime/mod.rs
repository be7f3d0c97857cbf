//! HTTP host runtime for actions.

mod config;
mod server;

pub use config::ServerConfig;
pub use server::ActionServer;
