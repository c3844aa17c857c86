//! Proactive suggestions gated by cooldowns and dismissals
//!
//! A trigger fires for a session when its condition holds, the user has
//! not dismissed its suggestion within the retention window, and its
//! cooldown has elapsed since it last fired. Firing records the time
//! atomically so concurrent turns for one session cannot both fire.

use crate::prompts::{describe_route, suggestion_user_prompt, SUGGESTION_SYSTEM};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wayfinder_core::config::TriggerConfig;
use wayfinder_core::{Clock, RouteAction, RouteState};
use wayfinder_llm::{complete_text, format_prompt, LanguageModel};

/// Legs longer than this suggest a break
pub const LONG_DRIVE_KM: f64 = 400.0;

/// Stops at which a route is "taking shape"
pub const ROUTE_SHAPE_STOPS: usize = 4;

/// Something that happened in a conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerEvent {
    CityAdded { city: String },
    CityRemoved { city: String },
    RouteReordered,
    Search { query: String },
}

impl TriggerEvent {
    fn is_route_change(&self) -> bool {
        !matches!(self, TriggerEvent::Search { .. })
    }
}

impl From<&RouteAction> for TriggerEvent {
    fn from(action: &RouteAction) -> Self {
        match action {
            RouteAction::Added { city, .. } => TriggerEvent::CityAdded { city: city.clone() },
            RouteAction::Removed { city } => TriggerEvent::CityRemoved { city: city.clone() },
            RouteAction::Reordered { .. } => TriggerEvent::RouteReordered,
        }
    }
}

/// A canned reply the user can tap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickAction {
    pub label: String,
    pub message: String,
}

pub type Condition = fn(&TriggerEvent, &RouteState) -> bool;

/// A rule for when to interrupt the user
#[derive(Clone)]
pub struct Trigger {
    pub id: String,
    pub cooldown_ms: u64,
    /// Higher wins when several triggers could fire for one turn
    pub priority: u8,
    pub condition: Condition,
    /// Message used when generation fails, with `{city}`-style placeholders
    pub template: String,
    /// Templated like `template`
    pub quick_actions: Vec<QuickAction>,
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("cooldown_ms", &self.cooldown_ms)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Trigger {
    pub fn new(id: &str, cooldown_ms: u64, priority: u8, condition: Condition, template: &str) -> Self {
        Self {
            id: id.to_string(),
            cooldown_ms,
            priority,
            condition,
            template: template.to_string(),
            quick_actions: Vec::new(),
        }
    }

    pub fn with_quick_action(mut self, label: &str, message: &str) -> Self {
        self.quick_actions.push(QuickAction {
            label: label.to_string(),
            message: message.to_string(),
        });
        self
    }
}

/// Why a trigger did or did not fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    Fire,
    ConditionNotMet,
    Dismissed,
    CoolingDown,
    UnknownTrigger,
}

/// Result of asking for a suggestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionOutcome {
    pub should_show: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_actions: Vec<QuickAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// Set when `should_show` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppressed: Option<TriggerDecision>,
}

impl SuggestionOutcome {
    fn suppressed(decision: TriggerDecision) -> Self {
        Self {
            should_show: false,
            trigger_id: None,
            suggestion_id: None,
            message: None,
            quick_actions: Vec::new(),
            priority: None,
            suppressed: Some(decision),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CooldownRecord {
    pub session_id: String,
    pub trigger_id: String,
    pub last_fired_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DismissalRecord {
    pub suggestion_id: String,
    pub session_id: String,
    pub trigger_id: String,
    pub dismissed_at: u64,
}

#[derive(Debug, Clone)]
struct IssuedSuggestion {
    session_id: String,
    trigger_id: String,
    issued_at: u64,
}

type SessionTrigger = (String, String);

/// Decides when to interrupt and what to say
pub struct ProactiveTriggerEngine {
    triggers: Vec<Trigger>,
    model: Option<Arc<dyn LanguageModel>>,
    clock: Arc<dyn Clock>,
    retention_ms: u64,
    max_tokens: u32,
    cooldowns: DashMap<SessionTrigger, CooldownRecord>,
    dismissals: DashMap<SessionTrigger, DismissalRecord>,
    issued: DashMap<String, IssuedSuggestion>,
}

impl ProactiveTriggerEngine {
    /// Engine with the built-in triggers and any configured cooldown overrides
    pub fn new(
        config: &TriggerConfig,
        model: Option<Arc<dyn LanguageModel>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut triggers = builtin_triggers();
        for trigger in &mut triggers {
            if let Some(ms) = config.cooldown_overrides_ms.get(&trigger.id) {
                trigger.cooldown_ms = *ms;
            }
        }
        Self::with_triggers(triggers, config, model, clock)
    }

    pub fn with_triggers(
        mut triggers: Vec<Trigger>,
        config: &TriggerConfig,
        model: Option<Arc<dyn LanguageModel>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        triggers.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Self {
            triggers,
            model,
            clock,
            retention_ms: config.retention_secs.saturating_mul(1000),
            max_tokens: config.suggestion_max_tokens,
            cooldowns: DashMap::new(),
            dismissals: DashMap::new(),
            issued: DashMap::new(),
        }
    }

    pub fn trigger_ids(&self) -> Vec<&str> {
        self.triggers.iter().map(|t| t.id.as_str()).collect()
    }

    fn trigger(&self, trigger_id: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.id == trigger_id)
    }

    fn is_dismissed(&self, key: &SessionTrigger, now: u64) -> bool {
        self.dismissals
            .get(key)
            .is_some_and(|d| now.saturating_sub(d.dismissed_at) < self.retention_ms)
    }

    /// Evaluate without recording anything
    pub fn should_trigger(
        &self,
        trigger_id: &str,
        session_id: &str,
        event: &TriggerEvent,
        route: &RouteState,
    ) -> TriggerDecision {
        let Some(trigger) = self.trigger(trigger_id) else {
            return TriggerDecision::UnknownTrigger;
        };
        if !(trigger.condition)(event, route) {
            return TriggerDecision::ConditionNotMet;
        }
        let now = self.clock.now_ms();
        let key = (session_id.to_string(), trigger_id.to_string());
        if self.is_dismissed(&key, now) {
            return TriggerDecision::Dismissed;
        }
        match self.cooldowns.get(&key) {
            Some(record) if now.saturating_sub(record.last_fired_at) < trigger.cooldown_ms => {
                TriggerDecision::CoolingDown
            }
            _ => TriggerDecision::Fire,
        }
    }

    /// Check the cooldown and record a firing in one step
    fn claim(&self, trigger: &Trigger, key: SessionTrigger, now: u64) -> TriggerDecision {
        match self.cooldowns.entry(key) {
            Entry::Occupied(mut entry) => {
                if now.saturating_sub(entry.get().last_fired_at) < trigger.cooldown_ms {
                    return TriggerDecision::CoolingDown;
                }
                entry.get_mut().last_fired_at = now;
                TriggerDecision::Fire
            }
            Entry::Vacant(entry) => {
                let (session_id, trigger_id) = entry.key().clone();
                entry.insert(CooldownRecord {
                    session_id,
                    trigger_id,
                    last_fired_at: now,
                });
                TriggerDecision::Fire
            }
        }
    }

    /// Produce a suggestion if the trigger fires, recording the firing
    pub async fn generate_suggestion(
        &self,
        trigger_id: &str,
        session_id: &str,
        event: &TriggerEvent,
        route: &RouteState,
    ) -> SuggestionOutcome {
        let decision = self.should_trigger(trigger_id, session_id, event, route);
        if decision != TriggerDecision::Fire {
            debug!(trigger = trigger_id, session = session_id, ?decision, "Suggestion suppressed");
            return SuggestionOutcome::suppressed(decision);
        }
        let Some(trigger) = self.trigger(trigger_id) else {
            return SuggestionOutcome::suppressed(TriggerDecision::UnknownTrigger);
        };

        let now = self.clock.now_ms();
        let key = (session_id.to_string(), trigger_id.to_string());
        let claimed = self.claim(trigger, key, now);
        if claimed != TriggerDecision::Fire {
            return SuggestionOutcome::suppressed(claimed);
        }

        let vars = template_vars(event, route);
        let fallback = render(&trigger.template, &vars);
        let message = match &self.model {
            Some(model) => {
                let prompt = suggestion_user_prompt(&fallback, route);
                match complete_text(model.as_ref(), SUGGESTION_SYSTEM, &prompt, self.max_tokens).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(trigger = trigger_id, "Suggestion generation failed, using template: {e}");
                        fallback
                    }
                }
            }
            None => fallback,
        };

        let suggestion_id = Uuid::new_v4().to_string();
        self.issued.insert(
            suggestion_id.clone(),
            IssuedSuggestion {
                session_id: session_id.to_string(),
                trigger_id: trigger_id.to_string(),
                issued_at: now,
            },
        );
        info!(trigger = trigger_id, session = session_id, %suggestion_id, "Issued suggestion");

        SuggestionOutcome {
            should_show: true,
            trigger_id: Some(trigger_id.to_string()),
            suggestion_id: Some(suggestion_id),
            message: Some(message),
            quick_actions: trigger
                .quick_actions
                .iter()
                .map(|qa| QuickAction {
                    label: render(&qa.label, &vars),
                    message: render(&qa.message, &vars),
                })
                .collect(),
            priority: Some(trigger.priority),
            suppressed: None,
        }
    }

    /// First suggestion that fires for any of the turn's events, highest priority first
    pub async fn evaluate(
        &self,
        session_id: &str,
        events: &[TriggerEvent],
        route: &RouteState,
    ) -> Option<SuggestionOutcome> {
        for trigger in &self.triggers {
            for event in events {
                if self.should_trigger(&trigger.id, session_id, event, route) == TriggerDecision::Fire {
                    let outcome = self
                        .generate_suggestion(&trigger.id, session_id, event, route)
                        .await;
                    if outcome.should_show {
                        return Some(outcome);
                    }
                }
            }
        }
        None
    }

    /// Record that the user dismissed a suggestion; false for unknown ids
    pub fn dismiss(&self, suggestion_id: &str) -> bool {
        let Some(issued) = self.issued.get(suggestion_id).map(|s| s.clone()) else {
            return false;
        };
        let record = DismissalRecord {
            suggestion_id: suggestion_id.to_string(),
            session_id: issued.session_id.clone(),
            trigger_id: issued.trigger_id.clone(),
            dismissed_at: self.clock.now_ms(),
        };
        info!(trigger = %issued.trigger_id, session = %issued.session_id, "Suggestion dismissed");
        self.dismissals
            .insert((issued.session_id, issued.trigger_id), record);
        true
    }

    /// Drop records older than the retention window, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let retention = self.retention_ms;
        let stale = |at: u64| now.saturating_sub(at) >= retention;

        let before = self.cooldowns.len() + self.dismissals.len() + self.issued.len();
        self.cooldowns.retain(|_, r| !stale(r.last_fired_at));
        self.dismissals.retain(|_, r| !stale(r.dismissed_at));
        self.issued.retain(|_, s| !stale(s.issued_at));
        let after = self.cooldowns.len() + self.dismissals.len() + self.issued.len();
        before.saturating_sub(after)
    }
}

fn template_vars(event: &TriggerEvent, route: &RouteState) -> Vec<(&'static str, String)> {
    let mut vars = vec![
        ("stops", route.len().to_string()),
        ("total_km", format!("{:.0}", route.total_distance_km())),
        ("route", describe_route(route)),
    ];
    match event {
        TriggerEvent::CityAdded { city } | TriggerEvent::CityRemoved { city } => {
            vars.push(("city", city.clone()));
        }
        TriggerEvent::Search { query } => vars.push(("query", query.clone())),
        TriggerEvent::RouteReordered => {}
    }
    if let Some(leg) = route.longest_leg() {
        vars.push(("from", leg.from));
        vars.push(("to", leg.to));
        vars.push(("distance_km", format!("{:.0}", leg.distance_km)));
    }
    vars
}

fn render(template: &str, vars: &[(&'static str, String)]) -> String {
    let pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
    format_prompt(template, &pairs)
}

fn city_added(event: &TriggerEvent, _route: &RouteState) -> bool {
    matches!(event, TriggerEvent::CityAdded { .. })
}

fn long_drive(event: &TriggerEvent, route: &RouteState) -> bool {
    event.is_route_change()
        && route
            .longest_leg()
            .is_some_and(|leg| leg.distance_km > LONG_DRIVE_KM)
}

fn route_taking_shape(event: &TriggerEvent, route: &RouteState) -> bool {
    event.is_route_change() && route.len() >= ROUTE_SHAPE_STOPS
}

fn first_search(event: &TriggerEvent, route: &RouteState) -> bool {
    matches!(event, TriggerEvent::Search { .. }) && route.is_empty()
}

pub fn builtin_triggers() -> Vec<Trigger> {
    vec![
        Trigger::new(
            "city_added",
            30_000,
            2,
            city_added,
            "{city} is on the route. Want ideas for what to do there, or a good next stop nearby?",
        )
        .with_quick_action("Things to do", "What should I do in {city}?")
        .with_quick_action("Next stop", "Suggest a next stop near {city}"),
        Trigger::new(
            "long_drive",
            5 * 60_000,
            3,
            long_drive,
            "The drive from {from} to {to} is about {distance_km} km. Want a stop to break it up?",
        )
        .with_quick_action("Find a stop", "Find a town between {from} and {to}"),
        Trigger::new(
            "route_taking_shape",
            10 * 60_000,
            1,
            route_taking_shape,
            "Your trip has {stops} stops and about {total_km} km of driving. Want me to check the pacing?",
        )
        .with_quick_action("Check pacing", "Is this route too rushed?"),
        Trigger::new(
            "first_search",
            15 * 60_000,
            1,
            first_search,
            "Found somewhere you like? I can add it to your route and suggest what's nearby.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::{GeoPoint, ManualClock, Waypoint};
    use wayfinder_llm::ScriptedModel;

    fn engine(clock: Arc<ManualClock>, model: Option<Arc<dyn LanguageModel>>) -> ProactiveTriggerEngine {
        ProactiveTriggerEngine::new(&TriggerConfig::default(), model, clock)
    }

    fn added(city: &str) -> TriggerEvent {
        TriggerEvent::CityAdded {
            city: city.to_string(),
        }
    }

    fn route(stops: &[(&str, f64, f64)]) -> RouteState {
        let mut route = RouteState::new();
        for (name, lat, lon) in stops {
            route
                .add(
                    Waypoint::new(*name, "Portugal").with_coordinates(GeoPoint::new(*lat, *lon)),
                    None,
                )
                .unwrap();
        }
        route
    }

    #[tokio::test]
    async fn test_city_added_cooldown_window() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone(), None);
        let state = route(&[("Porto", 41.15, -8.61)]);

        let first = engine
            .generate_suggestion("city_added", "s1", &added("Porto"), &state)
            .await;
        assert!(first.should_show);
        assert_eq!(
            first.message.as_deref(),
            Some("Porto is on the route. Want ideas for what to do there, or a good next stop nearby?")
        );
        assert_eq!(first.quick_actions[0].message, "What should I do in Porto?");

        clock.set(20_000);
        assert_eq!(
            engine.should_trigger("city_added", "s1", &added("Braga"), &state),
            TriggerDecision::CoolingDown
        );
        let second = engine
            .generate_suggestion("city_added", "s1", &added("Braga"), &state)
            .await;
        assert!(!second.should_show);
        assert_eq!(second.suppressed, Some(TriggerDecision::CoolingDown));

        // another session is unaffected
        assert_eq!(
            engine.should_trigger("city_added", "s2", &added("Braga"), &state),
            TriggerDecision::Fire
        );

        clock.set(31_000);
        let third = engine
            .generate_suggestion("city_added", "s1", &added("Braga"), &state)
            .await;
        assert!(third.should_show);
    }

    #[tokio::test]
    async fn test_condition_and_unknown_trigger() {
        let engine = engine(Arc::new(ManualClock::new(0)), None);
        let state = route(&[("Porto", 41.15, -8.61), ("Lisbon", 38.72, -9.14)]);
        assert_eq!(
            engine.should_trigger("long_drive", "s1", &added("Lisbon"), &state),
            TriggerDecision::ConditionNotMet
        );
        assert_eq!(
            engine.should_trigger("teleport", "s1", &added("Lisbon"), &state),
            TriggerDecision::UnknownTrigger
        );
    }

    #[tokio::test]
    async fn test_long_drive_fires_over_threshold() {
        let engine = engine(Arc::new(ManualClock::new(0)), None);
        // Porto to Seville is roughly 450 km
        let state = route(&[("Porto", 41.15, -8.61), ("Seville", 37.39, -5.98)]);
        let outcome = engine
            .generate_suggestion("long_drive", "s1", &added("Seville"), &state)
            .await;
        assert!(outcome.should_show);
        let message = outcome.message.unwrap();
        assert!(message.starts_with("The drive from Porto to Seville is about"));
        assert_eq!(outcome.priority, Some(3));
    }

    #[tokio::test]
    async fn test_dismissal_suppresses_within_retention() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone(), None);
        let state = route(&[("Porto", 41.15, -8.61)]);

        let outcome = engine
            .generate_suggestion("city_added", "s1", &added("Porto"), &state)
            .await;
        let id = outcome.suggestion_id.unwrap();
        assert!(engine.dismiss(&id));
        assert!(!engine.dismiss("no-such-suggestion"));

        clock.set(60_000);
        assert_eq!(
            engine.should_trigger("city_added", "s1", &added("Braga"), &state),
            TriggerDecision::Dismissed
        );

        // after the 24h retention the dismissal lapses
        clock.set(24 * 60 * 60 * 1000 + 1);
        assert_eq!(
            engine.should_trigger("city_added", "s1", &added("Braga"), &state),
            TriggerDecision::Fire
        );
    }

    #[tokio::test]
    async fn test_generated_text_and_fallback() {
        let state = route(&[("Porto", 41.15, -8.61)]);

        let model = Arc::new(ScriptedModel::new());
        model.push_text("  Porto's riverside is perfect at sunset; stay two nights?  ");
        let engine = engine_with(model.clone());
        let outcome = engine
            .generate_suggestion("city_added", "s1", &added("Porto"), &state)
            .await;
        assert_eq!(
            outcome.message.as_deref(),
            Some("Porto's riverside is perfect at sunset; stay two nights?")
        );
        let requests = model.requests();
        assert_eq!(requests[0].max_tokens, 120);
        assert!(requests[0].tools.is_empty());

        let failing: Arc<dyn LanguageModel> = Arc::new(ScriptedModel::failing("down"));
        let engine = engine_with(failing);
        let outcome = engine
            .generate_suggestion("city_added", "s1", &added("Porto"), &state)
            .await;
        assert!(outcome.message.unwrap().starts_with("Porto is on the route."));
    }

    fn engine_with(model: Arc<dyn LanguageModel>) -> ProactiveTriggerEngine {
        engine(Arc::new(ManualClock::new(0)), Some(model))
    }

    #[tokio::test]
    async fn test_evaluate_prefers_higher_priority() {
        let engine = engine(Arc::new(ManualClock::new(0)), None);
        let state = route(&[("Porto", 41.15, -8.61), ("Seville", 37.39, -5.98)]);
        let outcome = engine
            .evaluate("s1", &[added("Seville")], &state)
            .await
            .unwrap();
        assert_eq!(outcome.trigger_id.as_deref(), Some("long_drive"));

        // the next-best trigger fires on the following turn
        let outcome = engine
            .evaluate("s1", &[added("Seville")], &state)
            .await
            .unwrap();
        assert_eq!(outcome.trigger_id.as_deref(), Some("city_added"));
    }

    #[tokio::test]
    async fn test_first_search_only_with_empty_route() {
        let engine = engine(Arc::new(ManualClock::new(0)), None);
        let search = TriggerEvent::Search {
            query: "beaches".to_string(),
        };
        assert_eq!(
            engine.should_trigger("first_search", "s1", &search, &RouteState::new()),
            TriggerDecision::Fire
        );
        let state = route(&[("Porto", 41.15, -8.61)]);
        assert_eq!(
            engine.should_trigger("first_search", "s1", &search, &state),
            TriggerDecision::ConditionNotMet
        );
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_records_once() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone(), None);
        let state = route(&[("Porto", 41.15, -8.61)]);
        let outcome = engine
            .generate_suggestion("city_added", "s1", &added("Porto"), &state)
            .await;
        engine.dismiss(&outcome.suggestion_id.unwrap());

        assert_eq!(engine.cleanup(), 0);
        clock.set(24 * 60 * 60 * 1000);
        // cooldown, dismissal and issued suggestion
        assert_eq!(engine.cleanup(), 3);
        assert_eq!(engine.cleanup(), 0);
    }

    #[test]
    fn test_cooldown_override_from_config() {
        let mut config = TriggerConfig::default();
        config.cooldown_overrides_ms.insert("city_added".to_string(), 5);
        let engine = ProactiveTriggerEngine::new(&config, None, Arc::new(ManualClock::new(0)));
        assert_eq!(engine.trigger("city_added").map(|t| t.cooldown_ms), Some(5));
        assert_eq!(
            engine.trigger_ids(),
            vec!["long_drive", "city_added", "first_search", "route_taking_shape"]
        );
    }
}
