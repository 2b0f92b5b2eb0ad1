mod draft;
mod server;

pub use draft::DraftConfig;
pub use server::{ServerConfig, ServerConfigFile};
