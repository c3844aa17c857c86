//! REST API server implementation using Axum
//!
//! Chat turns stream as server-sent events, one event per agent step.
//! Every other endpoint is plain JSON.

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header::HeaderName, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wayfinder_agent::{AgentError, ChatReply, EventSink, TriggerEvent};
use wayfinder_core::config::ServerConfig;
use wayfinder_discovery::{DiscoveryError, SearchRequest, SearchResponse};

const SESSION_HEADER: &str = "x-session-id";

/// Build the Axum router with all endpoints
pub fn build_router(state: AppState, server_config: &ServerConfig) -> Router {
    let router = Router::new()
        // Conversation
        .route("/api/v1/chat", post(chat_handler))
        .route("/api/v1/sessions/{id}/route", get(route_handler))
        // Discovery
        .route("/api/v1/search", post(search_handler))
        // Proactive suggestions
        .route("/api/v1/suggestions", post(suggestion_handler))
        .route("/api/v1/suggestions/{id}/dismiss", post(dismiss_handler))
        // Health check
        .route("/health", get(health_handler));

    // Configure CORS based on allowed_origins
    let cors_layer = if server_config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else if server_config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let mut cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
            .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

        for origin in &server_config.allowed_origins {
            if let Ok(header_value) = HeaderValue::from_str(origin) {
                cors = cors.allow_origin(header_value);
            }
        }
        cors
    };

    router
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omit to start a new session
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
    /// Stream events (default) or wait for the full reply
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub reply: ChatReply,
}

fn session_header(session_id: &str) -> Result<[(HeaderName, HeaderValue); 1], ApiError> {
    let value = HeaderValue::from_str(session_id)
        .map_err(|_| ApiError::InvalidRequest("session_id contains invalid characters".into()))?;
    Ok([(HeaderName::from_static(SESSION_HEADER), value)])
}

/// POST /api/v1/chat
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::InvalidRequest("message must not be empty".into()));
    }
    let session_id = request
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let headers = session_header(&session_id)?;
    info!(session = %session_id, stream = request.stream, "Chat request");

    if !request.stream {
        let reply = state
            .conversation
            .handle_message(&session_id, &message, EventSink::disabled())
            .await?;
        return Ok((headers, Json(ChatResponse { session_id, reply })).into_response());
    }

    let (sink, rx) = EventSink::channel(state.conversation.event_buffer());
    let conversation = state.conversation.clone();
    let turn_session = session_id.clone();
    tokio::spawn(async move {
        if let Err(e) = conversation.handle_message(&turn_session, &message, sink).await {
            debug!(session = %turn_session, "Chat turn ended with error: {e}");
        }
    });

    let stream = ReceiverStream::new(rx).filter_map(|event| match serde_json::to_string(&event) {
        Ok(json) => Some(Ok::<_, std::convert::Infallible>(
            Event::default().event(event.name()).data(json),
        )),
        Err(e) => {
            warn!(error = %e, "Failed to serialize stream event");
            None
        }
    });

    Ok((headers, Sse::new(stream).keep_alive(KeepAlive::default())).into_response())
}

/// POST /api/v1/search
async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    info!(query = %request.query, "Search request");
    let response = state.conversation.discovery().search(&request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub session_id: String,
    pub trigger_id: String,
    pub event: TriggerEvent,
}

/// POST /api/v1/suggestions
async fn suggestion_handler(
    State(state): State<AppState>,
    Json(request): Json<SuggestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let route = state
        .conversation
        .store()
        .load_route(&request.session_id)
        .await?;
    let outcome = state
        .conversation
        .triggers()
        .generate_suggestion(&request.trigger_id, &request.session_id, &request.event, &route)
        .await;
    Ok(Json(outcome))
}

/// POST /api/v1/suggestions/{id}/dismiss
async fn dismiss_handler(
    State(state): State<AppState>,
    Path(suggestion_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.conversation.triggers().dismiss(&suggestion_id) {
        return Err(ApiError::NotFound(format!("Unknown suggestion: {suggestion_id}")));
    }
    Ok(Json(json!({ "suggestion_id": suggestion_id, "dismissed": true })))
}

/// GET /api/v1/sessions/{id}/route
async fn route_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let route = state.conversation.store().load_route(&session_id).await?;
    Ok(Json(json!({
        "session_id": session_id,
        "stops": route.waypoints,
        "legs": route.legs(),
        "total_distance_km": route.total_distance_km().round(),
        "total_nights": route.total_nights(),
    })))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let discovery = state.conversation.discovery();
    let health_status = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
        "cities": discovery.dataset().len(),
        "cached_searches": discovery.cache().map_or(0, |c| c.len()),
    });

    (StatusCode::OK, Json(health_status))
}

/// Error handling for API endpoints
#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
    NotFound(String),
    RateLimited { message: String, retry_after_ms: u64 },
    Timeout(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::RateLimited {
                message,
                retry_after_ms,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": message, "retry_after_ms": retry_after_ms }),
            ),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, json!({ "error": msg })),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": msg }))
            }
            ApiError::Internal(err) => {
                // Log the full error details for debugging
                tracing::error!("Internal server error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::AdmissionDenied { retry_after_ms, .. } => ApiError::RateLimited {
                message: err.user_message().to_string(),
                retry_after_ms,
            },
            AgentError::LoopTimeout { .. } => ApiError::Timeout(err.user_message().to_string()),
            AgentError::InvalidInput(msg) => ApiError::InvalidRequest(msg),
            AgentError::Session(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            DiscoveryError::AllSourcesFailed { .. } => ApiError::ServiceUnavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<wayfinder_core::Error> for ApiError {
    fn from(err: wayfinder_core::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
