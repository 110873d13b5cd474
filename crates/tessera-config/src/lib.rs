//! Configuration system for the tessera session service.
//!
//! Provides TOML-based configuration with:
//! - Session lifetime and concurrency limits (`[session]`)
//! - Role-cache lifetime (`[roles]`)
//! - Key-value store selection (`[store]`)
//! - Request-boundary server settings (`[server]`)
//! - Log file placement (`[logging]`)
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a usable configuration.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, xdg_config_dir, xdg_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;
