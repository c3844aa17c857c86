//! Prompt templates for the agent loop and proactive suggestions

use wayfinder_core::{Preference, RouteState};
use wayfinder_llm::format_prompt;

const AGENT_SYSTEM: &str = include_str!("../assets/prompts/agent_system.txt");

pub(crate) const SUGGESTION_SYSTEM: &str = include_str!("../assets/prompts/suggestion_system.txt");

const SUGGESTION_USER: &str = include_str!("../assets/prompts/suggestion_user.txt");

/// One line per stop, or a placeholder for an empty route
pub(crate) fn describe_route(route: &RouteState) -> String {
    if route.is_empty() {
        return "(no stops yet)".to_string();
    }
    let stops = route
        .waypoints
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let nights = if w.nights == 1 { "night" } else { "nights" };
            format!("{}. {} ({} {nights})", i + 1, w.city, w.nights)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{stops}\nTotal driving: about {:.0} km",
        route.total_distance_km()
    )
}

fn describe_preferences(preferences: &[Preference]) -> String {
    if preferences.is_empty() {
        return "(none recorded)".to_string();
    }
    preferences
        .iter()
        .map(|p| format!("- {}: {}", p.key.replace('_', " "), p.value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn agent_system_prompt(route: &RouteState, preferences: &[Preference]) -> String {
    format_prompt(
        AGENT_SYSTEM,
        &[
            ("route", &describe_route(route)),
            ("preferences", &describe_preferences(preferences)),
        ],
    )
}

pub(crate) fn suggestion_user_prompt(situation: &str, route: &RouteState) -> String {
    format_prompt(
        SUGGESTION_USER,
        &[("situation", situation), ("route", &route.names().join(" → "))],
    )
}
