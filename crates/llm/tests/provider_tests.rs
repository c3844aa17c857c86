//! Provider factory and live API tests

use wayfinder_core::config::LlmConfig;
use wayfinder_llm::{complete_text, create_language_model, LlmError, ScriptedModel};

#[test]
fn test_factory_rejects_unknown_provider() {
    let config = LlmConfig {
        provider: "carrier-pigeon".to_string(),
        ..Default::default()
    };
    let result = create_language_model(&config);
    assert!(matches!(result, Err(LlmError::Config(_))));
}

#[test]
fn test_factory_builds_scripted_provider() {
    let config = LlmConfig {
        provider: "scripted".to_string(),
        ..Default::default()
    };
    let model = create_language_model(&config).expect("scripted provider should build");
    assert_eq!(model.name(), "scripted");
}

#[test]
fn test_factory_builds_anthropic_with_explicit_key() {
    let config = LlmConfig {
        api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    let model = create_language_model(&config).expect("anthropic provider should build");
    assert_eq!(model.name(), config.model);
}

#[tokio::test]
async fn test_complete_text_trims_and_rejects_empty() {
    let model = ScriptedModel::new();
    model.push_text("  Try Comporta.  \n").push_text("   ");

    let text = complete_text(&model, "system", "user", 50)
        .await
        .expect("first call should succeed");
    assert_eq!(text, "Try Comporta.");

    let empty = complete_text(&model, "system", "user", 50).await;
    assert!(matches!(empty, Err(LlmError::InvalidResponse(_))));
}

/// Requires ANTHROPIC_API_KEY and network access.
/// Run with: cargo test --package wayfinder-llm -- --ignored test_anthropic_live_completion
#[tokio::test]
#[ignore]
async fn test_anthropic_live_completion() {
    let config = LlmConfig::default();
    let model = create_language_model(&config).expect("ANTHROPIC_API_KEY must be set");
    let text = complete_text(
        model.as_ref(),
        "Reply with a single word.",
        "Name a city in Portugal.",
        20,
    )
    .await
    .expect("live completion should succeed");
    assert!(!text.is_empty());
}
