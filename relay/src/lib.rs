pub mod config;
pub mod server;

pub use config::RelaySettings;
pub use server::{RelayServer, ServerError, ENHANCE_PATH};
