//! Tests for configuration module

use super::*;
use crate::error::{Error, Result};
use std::io::Write;
use tempfile::NamedTempFile;

fn create_temp_config_file(content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .map_err(|e| Error::config(format!("Failed to create temp file: {e}")))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::config(format!("Failed to write temp file: {e}")))?;
    file.flush()
        .map_err(|e| Error::config(format!("Failed to flush temp file: {e}")))?;
    Ok(file)
}

fn with_env_var<F, T>(key: &str, value: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    std::env::set_var(key, value);
    let result = f();
    std::env::remove_var(key);
    result
}

#[test]
fn test_from_toml_str_valid() {
    let toml = r#"
        [llm]
        provider = "scripted"
        model = "test-model"

        [agent]
        max_iterations = 3

        [cache]
        capacity = 10
        [cache.intent_ttl_secs]
        foodie = 120
    "#;

    let config = Config::from_toml_str(toml).expect("Failed to parse valid TOML");
    assert_eq!(config.llm.provider, "scripted");
    assert_eq!(config.llm.model, "test-model");
    assert_eq!(config.agent.max_iterations, 3);
    assert_eq!(config.cache.capacity, 10);
    assert_eq!(config.cache.intent_ttl_secs.get("foodie"), Some(&120));
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_toml_str_empty_applies_defaults() {
    let config = Config::from_toml_str("").expect("Failed to parse empty TOML");
    assert_eq!(config.llm.provider, "anthropic");
    assert_eq!(config.agent.max_iterations, 5);
    assert_eq!(config.agent.timeout_secs, 60);
    assert_eq!(config.agent.history_window, 10);
    assert_eq!(config.rate_limit.window_ms, 60_000);
    assert_eq!(config.discovery.default_max_results, 5);
    assert_eq!(config.triggers.suggestion_max_tokens, 120);
    assert!(config.cache.enabled);
}

#[test]
fn test_from_toml_str_invalid_syntax() {
    let toml = r#"
        [llm
        provider = "scripted"
    "#;

    let result = Config::from_toml_str(toml);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to parse TOML"));
}

#[test]
fn test_validate_rejects_unknown_provider() {
    let mut config = Config::default();
    config.llm.provider = "carrier-pigeon".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Invalid llm provider"));
}

#[test]
fn test_validate_iteration_bounds() {
    let mut config = Config::default();
    config.agent.max_iterations = 0;
    assert!(config.validate().is_err());

    config.agent.max_iterations = 21;
    assert!(config.validate().is_err());

    config.agent.max_iterations = 20;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rate_limit_and_cache() {
    let mut config = Config::default();
    config.rate_limit.max_requests = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.cache.capacity = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_max_results_range() {
    let mut config = Config::default();
    config.discovery.default_max_results = 25;
    assert!(config.validate().is_err());

    config.discovery.default_max_results = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_from_file_reads_values() -> Result<()> {
    let file = create_temp_config_file(
        r#"
        [server]
        port = 9191

        [rate_limit]
        window_ms = 1000
        max_requests = 2
    "#,
    )?;

    let config = Config::from_file(file.path())?;
    assert_eq!(config.server.port, 9191);
    assert_eq!(config.rate_limit.window_ms, 1000);
    assert_eq!(config.rate_limit.max_requests, 2);
    Ok(())
}

#[test]
fn test_from_file_missing_path_uses_defaults() -> Result<()> {
    let config = Config::from_file(std::path::Path::new("/nonexistent/wayfinder.toml"))?;
    assert_eq!(config.server.port, 8080);
    Ok(())
}

#[test]
fn test_env_override() -> Result<()> {
    let file = create_temp_config_file("[triggers]\nretention_secs = 10\n")?;
    let config = with_env_var("WAYFINDER_TRIGGERS__RETENTION_SECS", "42", || {
        Config::from_file(file.path())
    })?;
    assert_eq!(config.triggers.retention_secs, 42);
    Ok(())
}

#[test]
fn test_debug_redacts_api_key() {
    let llm = LlmConfig {
        api_key: Some("sk-secret-12345".to_string()),
        ..Default::default()
    };
    let debug_output = format!("{llm:?}");
    assert!(!debug_output.contains("sk-secret-12345"));
    assert!(debug_output.contains("[REDACTED]"));
}
