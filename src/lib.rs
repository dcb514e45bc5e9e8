// Library exports for station_core

pub mod assets;
pub mod chain;
pub mod config;
pub mod confirm;
pub mod fee;
pub mod format;

// Re-export main types for convenience
pub use chain::{ChainClient, ChainOptions, ChainRegistry, LcdClient, NetworkName, User};
pub use config::Config;
pub use confirm::{ConfirmError, ConfirmProps, ConfirmSession, SessionState};
