//! Configuration management for keylime-export
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! API credentials are only ever read from the environment
//! (`KEYLIME_TOOLBOX_EMAIL` and `KEYLIME_TOOLBOX_TOKEN`), never from the file.
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `KEYLIME_EXPORT__<section>__<key>`.
//!
//! Examples:
//! - `KEYLIME_EXPORT__API__BASE_URL=http://127.0.0.1:4000`
//! - `KEYLIME_EXPORT__STORAGE__REGION=eu-west-1`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/keylime-export.toml`.
//! This can be overridden using the `KEYLIME_EXPORT_CONFIG` environment
//! variable or the `--config` option.

mod models;
mod sources;
mod validation;

pub use models::{ApiConfig, Config, HttpConfig, StorageConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("{0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources. An explicit `config_path` takes
    /// priority over the `KEYLIME_EXPORT_CONFIG` environment variable and
    /// the default location.
    ///
    /// Validation is separate: the bucket, region and path prefix can still
    /// be overridden from the command line after loading, so callers run
    /// [`Config::validate`] once every override is applied.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Ok(sources::load(config_path)?)
    }

    /// Check that credentials and the storage destination are resolvable
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}
