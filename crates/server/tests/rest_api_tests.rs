//! Integration tests for REST API endpoints
//!
//! The router runs against a scripted language model and the embedded
//! city dataset, so no network access is needed.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wayfinder_core::Config;
use wayfinder_llm::{CompletionResponse, ScriptedModel};
use wayfinder_server::{build_router, AppState};

fn config() -> Config {
    let mut config = Config::default();
    config.discovery.external_enabled = false;
    config
}

fn app_with(model: ScriptedModel, config: Config) -> Router {
    let state = AppState::with_model(&config, Arc::new(model)).unwrap();
    build_router(state, &config.server)
}

fn app(model: ScriptedModel) -> Router {
    app_with(model, config())
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app(ScriptedModel::offline())
        .oneshot(get("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "scripted");
    assert!(body["cities"].as_u64().unwrap() > 20);
}

#[tokio::test]
async fn test_search_returns_ranked_cities() {
    let response = app(ScriptedModel::offline())
        .oneshot(post(
            "/api/v1/search",
            json!({"query": "quiet beach towns", "max_results": 3}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["intent"]["name"], "coastal");
    assert_eq!(body["cached"], false);
    let cities = body["cities"].as_array().unwrap();
    assert!(!cities.is_empty() && cities.len() <= 3);
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let response = app(ScriptedModel::offline())
        .oneshot(post("/api/v1/search", json!({"query": "  "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_chat_without_streaming_returns_reply() {
    let model = ScriptedModel::repeating(CompletionResponse::text("Hi! Where are you starting from?"));
    let response = app(model)
        .oneshot(post(
            "/api/v1/chat",
            json!({"session_id": "trip-1", "message": "Plan a trip", "stream": false}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-session-id"], "trip-1");
    let body = body_json(response).await;
    assert_eq!(body["session_id"], "trip-1");
    assert_eq!(body["answer"], "Hi! Where are you starting from?");
    assert_eq!(body["termination"], "final_answer");
}

#[tokio::test]
async fn test_chat_streams_events() {
    let model = ScriptedModel::repeating(CompletionResponse::text("Happy to help."));
    let response = app(model)
        .oneshot(post("/api/v1/chat", json!({"message": "Hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-session-id"));
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let thinking = text.find("event: thinking").unwrap();
    let complete = text.find("event: complete").unwrap();
    assert!(thinking < complete);
    assert!(text.contains("Happy to help."));
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let response = app(ScriptedModel::offline())
        .oneshot(post("/api/v1/chat", json!({"message": ""})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_rate_limited() {
    let mut config = config();
    config.rate_limit.max_requests = 1;
    let router = app_with(
        ScriptedModel::repeating(CompletionResponse::text("Sure.")),
        config,
    );
    let request = || {
        post(
            "/api/v1/chat",
            json!({"session_id": "busy", "message": "again", "stream": false}),
        )
    };

    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(body_json(second).await["retry_after_ms"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_route_reflects_chat_changes() {
    let model = ScriptedModel::new();
    model
        .push_tool_call("t1", "add_city", json!({"city": "Porto", "nights": 2}))
        .push_text("Porto added.");
    let router = app(model);

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/chat",
            json!({"session_id": "trip-2", "message": "Add Porto", "stream": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let route = body_json(
        router
            .oneshot(get("/api/v1/sessions/trip-2/route"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(route["stops"][0]["city"], "Porto");
    assert_eq!(route["total_nights"], 2);
}

#[tokio::test]
async fn test_suggestion_then_dismiss() {
    let router = app(ScriptedModel::new());

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/suggestions",
            json!({
                "session_id": "trip-3",
                "trigger_id": "first_search",
                "event": {"kind": "search", "query": "beaches"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["should_show"], true);
    let id = outcome["suggestion_id"].as_str().unwrap().to_string();

    let dismissed = router
        .clone()
        .oneshot(post(&format!("/api/v1/suggestions/{id}/dismiss"), json!({})))
        .await
        .unwrap();
    assert_eq!(dismissed.status(), StatusCode::OK);

    let unknown = router
        .clone()
        .oneshot(post("/api/v1/suggestions/nope/dismiss", json!({})))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let again = router
        .oneshot(post(
            "/api/v1/suggestions",
            json!({
                "session_id": "trip-3",
                "trigger_id": "first_search",
                "event": {"kind": "search", "query": "mountains"}
            }),
        ))
        .await
        .unwrap();
    let outcome = body_json(again).await;
    assert_eq!(outcome["should_show"], false);
    assert_eq!(outcome["suppressed"], "dismissed");
}
