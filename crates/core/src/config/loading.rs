//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, Environment, File};
use std::path::Path;

use super::{global_config_path, Config};

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `WAYFINDER_` and use double underscores
    /// for nested values. For example:
    /// - `WAYFINDER_LLM__PROVIDER=scripted`
    /// - `WAYFINDER_RATE_LIMIT__MAX_REQUESTS=50`
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
        }

        builder = builder.add_source(
            Environment::with_prefix("WAYFINDER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // The provider's conventional variable, lower precedence than WAYFINDER_LLM__API_KEY
        if std::env::var("WAYFINDER_LLM__API_KEY").is_err() {
            if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                builder = builder
                    .set_override("llm.api_key", key)
                    .map_err(|e| Error::config(format!("Failed to set ANTHROPIC_API_KEY: {e}")))?;
            }
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.wayfinder/config.toml or custom --config path)
    /// 3. Environment variables (WAYFINDER_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
