//! Configuration module for the wayfinder system
//!
//! This module provides configuration structures and loading mechanisms.
//! Configuration can be loaded from TOML files and/or environment variables.

mod defaults;
mod loading;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.wayfinder/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".wayfinder").join("config.toml"))
}

/// Main configuration structure for the wayfinder system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Agentic loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Per-session admission control
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Search result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Multi-source discovery
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Proactive suggestions
    #[serde(default)]
    pub triggers: TriggerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// CORS origins; empty disables CORS, `*` allows all
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Configuration for the language model provider
///
/// # Providers
/// - `anthropic` (default): Anthropic Messages API, uses ANTHROPIC_API_KEY env var
/// - `scripted`: canned responses, for local runs without network access
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type: "anthropic" (default), "scripted"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key (or use ANTHROPIC_API_KEY env var)
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Upper bound on tokens per completion
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient HTTP failures
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: default_llm_base_url(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

impl LlmConfig {
    /// API key from config, falling back to the ANTHROPIC_API_KEY env var
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

/// Agentic loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model invocations per user message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Number of recent conversation turns sent to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Wall-clock budget for one user message
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,

    /// Max tokens per loop completion
    #[serde(default = "default_agent_max_tokens")]
    pub max_tokens: u32,

    /// Capacity of the streaming event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_window: default_history_window(),
            timeout_secs: default_agent_timeout_secs(),
            max_tokens: default_agent_max_tokens(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Sliding-window admission control per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,

    /// Admitted requests per window
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: usize,

    /// How often idle session windows are swept
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_rate_limit_window_ms(),
            max_requests: default_rate_limit_max_requests(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Search result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching of ranked results
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Default entry lifetime
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of entries before the oldest is evicted
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Per-intent TTL overrides, keyed by intent name
    #[serde(default)]
    pub intent_ttl_secs: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
            intent_ttl_secs: HashMap::new(),
        }
    }
}

/// Multi-source discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// JSON file with the curated city dataset; the embedded sample is used when unset
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,

    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Hard cap on requested results
    #[serde(default = "default_max_results_limit")]
    pub max_results_limit: usize,

    /// Radius used for `near_city` searches
    #[serde(default = "default_near_radius_km")]
    pub near_radius_km: f64,

    /// Query the language model as an external source
    #[serde(default = "default_external_enabled")]
    pub external_enabled: bool,

    /// Max tokens for external source completions
    #[serde(default = "default_external_max_tokens")]
    pub external_max_tokens: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            default_max_results: default_max_results(),
            max_results_limit: default_max_results_limit(),
            near_radius_km: default_near_radius_km(),
            external_enabled: default_external_enabled(),
            external_max_tokens: default_external_max_tokens(),
        }
    }
}

/// Proactive suggestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Evaluate triggers after route changes
    #[serde(default = "default_triggers_enabled")]
    pub enabled: bool,

    /// How long cooldown and dismissal records are retained
    #[serde(default = "default_trigger_retention_secs")]
    pub retention_secs: u64,

    /// How often stale records are swept
    #[serde(default = "default_trigger_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Max tokens for generated suggestion text
    #[serde(default = "default_suggestion_max_tokens")]
    pub suggestion_max_tokens: u32,

    /// Per-trigger cooldown overrides in milliseconds, keyed by trigger id
    #[serde(default)]
    pub cooldown_overrides_ms: HashMap<String, u64>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: default_triggers_enabled(),
            retention_secs: default_trigger_retention_secs(),
            sweep_interval_secs: default_trigger_sweep_interval_secs(),
            suggestion_max_tokens: default_suggestion_max_tokens(),
            cooldown_overrides_ms: HashMap::new(),
        }
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_providers = ["anthropic", "scripted"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            return Err(Error::config(format!(
                "Invalid llm provider '{}'. Must be one of: {:?}",
                self.llm.provider, valid_providers
            )));
        }

        if self.llm.max_tokens == 0 {
            return Err(Error::config(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.agent.max_iterations == 0 || self.agent.max_iterations > 20 {
            return Err(Error::config(format!(
                "agent.max_iterations must be between 1 and 20 (got {})",
                self.agent.max_iterations
            )));
        }

        if self.agent.timeout_secs == 0 {
            return Err(Error::config(
                "agent.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.agent.event_buffer == 0 {
            return Err(Error::config(
                "agent.event_buffer must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.window_ms == 0 || self.rate_limit.max_requests == 0 {
            return Err(Error::config(
                "rate_limit.window_ms and rate_limit.max_requests must be greater than 0"
                    .to_string(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(Error::config(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }

        if self.discovery.default_max_results == 0
            || self.discovery.default_max_results > self.discovery.max_results_limit
        {
            return Err(Error::config(format!(
                "discovery.default_max_results must be between 1 and max_results_limit ({})",
                self.discovery.max_results_limit
            )));
        }

        if self.discovery.near_radius_km.is_nan() || self.discovery.near_radius_km <= 0.0 {
            return Err(Error::config(
                "discovery.near_radius_km must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
