//! calisync core library — configuration and shared errors.
//!
//! - [`config`] — [`SyncConfig`] and its defaults
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;

pub use config::SyncConfig;
pub use error::ConfigError;
