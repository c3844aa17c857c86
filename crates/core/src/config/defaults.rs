//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_LLM_PROVIDER: &str = "anthropic";
pub(crate) const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5";
pub(crate) const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";

pub(crate) fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

pub(crate) fn default_server_port() -> u16 {
    8080
}

pub(crate) fn default_llm_provider() -> String {
    DEFAULT_LLM_PROVIDER.to_string()
}

pub(crate) fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

pub(crate) fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

pub(crate) fn default_llm_max_tokens() -> u32 {
    4096
}

pub(crate) fn default_llm_timeout_secs() -> u64 {
    45
}

pub(crate) fn default_llm_max_retries() -> u32 {
    2
}

pub(crate) fn default_max_iterations() -> usize {
    5
}

pub(crate) fn default_history_window() -> usize {
    10
}

pub(crate) fn default_agent_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_agent_max_tokens() -> u32 {
    1024
}

pub(crate) fn default_event_buffer() -> usize {
    64
}

pub(crate) fn default_rate_limit_window_ms() -> u64 {
    60_000
}

pub(crate) fn default_rate_limit_max_requests() -> usize {
    20
}

pub(crate) fn default_sweep_interval_secs() -> u64 {
    60
}

pub(crate) fn default_cache_enabled() -> bool {
    true
}

pub(crate) fn default_cache_ttl_secs() -> u64 {
    3600
}

pub(crate) fn default_cache_capacity() -> usize {
    500
}

pub(crate) fn default_max_results() -> usize {
    5
}

pub(crate) fn default_max_results_limit() -> usize {
    20
}

pub(crate) fn default_near_radius_km() -> f64 {
    300.0
}

pub(crate) fn default_external_enabled() -> bool {
    true
}

pub(crate) fn default_external_max_tokens() -> u32 {
    1024
}

pub(crate) fn default_triggers_enabled() -> bool {
    true
}

pub(crate) fn default_trigger_retention_secs() -> u64 {
    24 * 60 * 60
}

pub(crate) fn default_trigger_sweep_interval_secs() -> u64 {
    300
}

pub(crate) fn default_suggestion_max_tokens() -> u32 {
    120
}
