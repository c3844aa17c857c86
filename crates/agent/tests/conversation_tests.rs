//! Full conversation turns with a scripted model and in-memory session store

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use wayfinder_agent::{
    AgentError, ChatReply, ConversationService, EventSink, StreamEvent, Termination,
};
use wayfinder_core::{Config, InMemorySessionStore, ManualClock, SessionStore};
use wayfinder_discovery::{CityDataset, DiscoveryService};
use wayfinder_llm::{CompletionResponse, ScriptedModel, StopReason, ToolCall};

struct Harness {
    service: ConversationService,
    model: Arc<ScriptedModel>,
    clock: Arc<ManualClock>,
    store: Arc<dyn SessionStore>,
}

fn harness_with(model: ScriptedModel, config: Config) -> Harness {
    let model = Arc::new(model);
    let clock = Arc::new(ManualClock::new(0));
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let dataset = Arc::new(CityDataset::embedded().unwrap());
    let discovery = Arc::new(DiscoveryService::new(&config, dataset, None, clock.clone()));
    let service = ConversationService::new(
        &config,
        model.clone(),
        discovery,
        store.clone(),
        clock.clone(),
    );
    Harness {
        service,
        model,
        clock,
        store,
    }
}

fn harness(model: ScriptedModel) -> Harness {
    harness_with(model, Config::default())
}

impl Harness {
    async fn send(&self, message: &str) -> (Result<ChatReply, AgentError>, Vec<StreamEvent>) {
        let (sink, rx) = EventSink::channel(64);
        let result = self.service.handle_message("s1", message, sink).await;
        (result, drain(rx))
    }
}

fn drain(mut rx: Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn event_names(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}

#[tokio::test]
async fn test_add_city_turn_streams_events_in_order() {
    let h = harness(ScriptedModel::new());
    h.model
        .push_tool_call("t1", "add_city", json!({"city": "Porto", "nights": 2}))
        .push_text("Porto is on your route for two nights.");

    let (result, events) = h.send("Add Porto for two nights").await;
    let reply = result.unwrap();

    assert_eq!(reply.termination, Termination::FinalAnswer);
    assert_eq!(reply.answer, "Porto is on your route for two nights.");
    assert_eq!(reply.iterations, 2);
    assert_eq!(reply.route.names(), vec!["Porto"]);
    assert_eq!(
        event_names(&events),
        vec![
            "thinking",
            "tool_start",
            "route_action",
            "tool_complete",
            "thinking",
            "text",
            "complete"
        ]
    );

    // route saved and both turns recorded
    assert_eq!(h.store.load_route("s1").await.unwrap().names(), vec!["Porto"]);
    assert_eq!(h.store.recent_history("s1", 10).await.unwrap().len(), 2);

    // the script is exhausted, so the suggestion falls back to its template
    let suggestion = reply.suggestion.unwrap();
    assert!(suggestion.should_show);
    assert_eq!(suggestion.trigger_id.as_deref(), Some("city_added"));
    assert!(suggestion.message.unwrap().starts_with("Porto is on the route."));
    assert_eq!(h.model.call_count(), 3);

    match events.last() {
        Some(StreamEvent::Complete { suggestion, .. }) => assert!(suggestion.is_some()),
        other => panic!("expected complete event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_city_added_suggestion_respects_cooldown() {
    let h = harness(ScriptedModel::new());

    h.model
        .push_tool_call("t1", "add_city", json!({"city": "Porto"}))
        .push_text("Added Porto.");
    let first = h.send("Add Porto").await.0.unwrap();
    assert!(first.suggestion.is_some());

    h.clock.set(20_000);
    h.model
        .push_tool_call("t2", "add_city", json!({"city": "Coimbra"}))
        .push_text("Added Coimbra.");
    let second = h.send("Add Coimbra").await.0.unwrap();
    assert!(second.suggestion.is_none());

    h.clock.set(31_000);
    h.model
        .push_tool_call("t3", "add_city", json!({"city": "Aveiro"}))
        .push_text("Added Aveiro.");
    let third = h.send("Add Aveiro").await.0.unwrap();
    let suggestion = third.suggestion.unwrap();
    assert_eq!(suggestion.trigger_id.as_deref(), Some("city_added"));
    assert_eq!(third.route.names(), vec!["Porto", "Coimbra", "Aveiro"]);
}

#[tokio::test]
async fn test_tool_use_every_iteration_exhausts_after_five_calls() {
    let model = ScriptedModel::repeating(CompletionResponse::tool_calls(vec![ToolCall {
        id: "t".to_string(),
        name: "get_route".to_string(),
        input: json!({}),
    }]));
    let h = harness(model);

    let (result, events) = h.send("Keep checking the route").await;
    let reply = result.unwrap();

    assert_eq!(reply.termination, Termination::Exhausted);
    assert!(reply.answer.contains("ran out of turns"));
    assert_eq!(reply.iterations, 5);
    assert_eq!(reply.tool_invocations.len(), 5);
    assert_eq!(h.model.call_count(), 5);
    assert_eq!(
        events.iter().filter(|e| e.name() == "thinking").count(),
        5
    );
    assert!(reply.suggestion.is_none());
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_the_model() {
    let h = harness(ScriptedModel::new());
    h.model
        .push_tool_call("t1", "book_hotel", json!({"city": "Porto"}))
        .push_text("I can't book hotels, but I can plan the route.");

    let (result, events) = h.send("Book me a hotel in Porto").await;
    let reply = result.unwrap();

    assert_eq!(reply.termination, Termination::FinalAnswer);
    assert_eq!(reply.tool_invocations.len(), 1);
    assert!(reply.tool_invocations[0].is_error);
    assert_eq!(
        reply.tool_invocations[0].output,
        json!({"error": "Unknown tool: book_hotel"})
    );
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ToolComplete { is_error: true, name, .. } if name == "book_hotel"
    )));

    // second call sees the assistant request and the tool result
    let requests = h.model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
}

#[tokio::test]
async fn test_rate_limit_denies_after_window_is_full() {
    let mut config = Config::default();
    config.rate_limit.max_requests = 2;
    let h = harness_with(
        ScriptedModel::repeating(CompletionResponse::text("Sure.")),
        config,
    );

    assert!(h.send("one").await.0.is_ok());
    assert!(h.send("two").await.0.is_ok());

    let (result, events) = h.send("three").await;
    match result {
        Err(AgentError::AdmissionDenied {
            session_id,
            retry_after_ms,
        }) => {
            assert_eq!(session_id, "s1");
            assert_eq!(retry_after_ms, 60_000);
        }
        other => panic!("expected admission denied, got {other:?}"),
    }
    assert_eq!(event_names(&events), vec!["error"]);
    assert_eq!(h.model.call_count(), 2);

    h.clock.set(60_000);
    assert!(h.send("four").await.0.is_ok());
}

#[tokio::test]
async fn test_timeout_keeps_committed_route_changes() {
    let mut config = Config::default();
    config.agent.timeout_secs = 1;
    let model = ScriptedModel::new().with_latency(Duration::from_millis(600));
    model
        .push_tool_call("t1", "add_city", json!({"city": "Lisbon"}))
        .push_text("Added Lisbon.");
    let h = harness_with(model, config);

    let (result, events) = h.send("Add Lisbon").await;
    assert!(matches!(
        result,
        Err(AgentError::LoopTimeout { timeout_secs: 1 })
    ));
    assert_eq!(events.last().map(|e| e.name()), Some("error"));
    assert!(events.iter().any(|e| e.name() == "route_action"));

    assert_eq!(h.store.load_route("s1").await.unwrap().names(), vec!["Lisbon"]);
    assert!(h.store.recent_history("s1", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_model_failure_returns_fallback_answer() {
    let h = harness(ScriptedModel::failing("connection refused"));

    let (result, events) = h.send("Where should I go?").await;
    let reply = result.unwrap();

    assert_eq!(reply.termination, Termination::GenerationFailed);
    assert!(reply.answer.contains("can't reach"));
    assert!(reply.tool_invocations.is_empty());
    assert_eq!(event_names(&events), vec!["thinking", "text", "complete"]);
}

#[tokio::test]
async fn test_unexpected_stop_reason_is_anomalous() {
    let h = harness(ScriptedModel::new());
    h.model.push_response(
        CompletionResponse::text("Lisbon, Porto and").with_stop_reason(StopReason::MaxTokens),
    );

    let reply = h.send("List every city").await.0.unwrap();
    assert_eq!(reply.termination, Termination::Anomalous);
    assert!(!reply.answer.contains("Lisbon, Porto and"));
}

#[tokio::test]
async fn test_history_and_route_reach_the_next_turn() {
    let h = harness(ScriptedModel::new());
    h.model
        .push_tool_call("t1", "add_city", json!({"city": "Seville"}))
        .push_text("Seville added.");
    h.send("Add Seville").await.0.unwrap();

    h.clock.set(5_000);
    h.model.push_text("Seville is your only stop so far.");
    h.send("What's on my route?").await.0.unwrap();

    let requests = h.model.requests();
    let last = requests.last().unwrap();
    assert!(last.system_prompt.contains("1. Seville"));
    assert_eq!(last.messages.len(), 3);
    assert_eq!(last.messages[0].text(), "Add Seville");
    assert_eq!(last.messages[1].text(), "Seville added.");
    assert_eq!(last.messages[2].text(), "What's on my route?");
}

#[tokio::test]
async fn test_search_with_empty_route_offers_first_search_nudge() {
    let h = harness(ScriptedModel::new());
    h.model
        .push_tool_call("t1", "search_cities", json!({"query": "quiet beach towns"}))
        .push_text("Tavira and Comporta are lovely and quiet.");

    let reply = h.send("Find me quiet beach towns").await.0.unwrap();

    assert!(!reply.tool_invocations[0].is_error);
    assert!(reply.tool_invocations[0].output["cities"]
        .as_array()
        .is_some_and(|c| !c.is_empty()));
    let suggestion = reply.suggestion.unwrap();
    assert_eq!(suggestion.trigger_id.as_deref(), Some("first_search"));
}

#[tokio::test]
async fn test_blank_message_rejected() {
    let h = harness(ScriptedModel::new());
    let (result, events) = h.send("   ").await;
    assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    assert_eq!(event_names(&events), vec!["error"]);
    assert_eq!(h.model.call_count(), 0);
    assert_eq!(h.service.rate_limiter().tracked_keys(), 0);
}

#[tokio::test]
async fn test_sweep_clears_expired_windows() {
    let h = harness(ScriptedModel::repeating(CompletionResponse::text("Hello!")));
    h.send("hi").await.0.unwrap();
    assert_eq!(h.service.rate_limiter().tracked_keys(), 1);

    h.clock.set(60_000);
    let stats = h.service.sweep();
    assert_eq!(stats.rate_limit_keys, 1);
    assert_eq!(h.service.rate_limiter().tracked_keys(), 0);
}
