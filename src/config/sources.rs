use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "KEYLIME_EXPORT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/keylime-export.toml";
const ENV_PREFIX: &str = "KEYLIME_EXPORT";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = config_path
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    // Load secrets from environment variables
    load_secrets(&mut config);

    Ok(config)
}

/// Load secrets from environment variables into config.
/// Credentials are never stored in TOML files, only in environment.
fn load_secrets(config: &mut Config) {
    if let Ok(email) = env::var("KEYLIME_TOOLBOX_EMAIL") {
        config.api.email = Some(email);
    }
    if let Ok(token) = env::var("KEYLIME_TOOLBOX_TOKEN") {
        config.api.token = Some(token);
    }

    // The --region option and the config file both take priority over the
    // ambient AWS region
    if config.storage.region.is_none() {
        if let Ok(region) = env::var("AWS_REGION") {
            config.storage.region = Some(region);
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Start with defaults (handled by struct Default implementations)
    // Add TOML file if it exists (optional)
    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // Add environment variable overrides
    // KEYLIME_EXPORT__STORAGE__REGION -> storage.region
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
