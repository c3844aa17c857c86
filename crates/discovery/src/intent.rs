//! Keyword signal scoring over free text

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the fallback intent
pub const GENERAL_INTENT: &str = "general";

/// Confidence reported when nothing matched
pub const GENERAL_CONFIDENCE: f64 = 0.5;

/// Score at which confidence saturates at 1.0
const NORMALIZING_SCORE: f64 = 3.0;

/// A classified user goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    pub score: f64,
    pub confidence: f64,
    pub matched_signals: Vec<String>,
}

impl Intent {
    /// The fallback returned when no signal matches
    pub fn general() -> Self {
        Self {
            name: GENERAL_INTENT.to_string(),
            score: 0.0,
            confidence: GENERAL_CONFIDENCE,
            matched_signals: Vec::new(),
        }
    }

    /// An intent chosen by the caller rather than classified
    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0.0,
            confidence: 1.0,
            matched_signals: Vec::new(),
        }
    }
}

/// An intent and the phrases that signal it
#[derive(Debug, Clone)]
pub struct IntentDefinition {
    pub name: String,
    signals: Vec<String>,
}

impl IntentDefinition {
    pub fn new(name: impl Into<String>, signals: &[&str]) -> Self {
        Self {
            name: name.into(),
            signals: signals.iter().map(|s| normalize_text(s)).collect(),
        }
    }
}

/// Classifies text into ranked intents
///
/// A signal's weight is its word count, so multi-word phrases count more
/// than single keywords. Signals match at word starts: `beach` matches
/// "beaches" but `sea` does not match "chelsea".
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    intents: Vec<IntentDefinition>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(builtin_intents())
    }
}

impl IntentClassifier {
    pub fn new(intents: Vec<IntentDefinition>) -> Self {
        Self { intents }
    }

    pub fn intent_names(&self) -> impl Iterator<Item = &str> {
        self.intents.iter().map(|i| i.name.as_str())
    }

    /// All matching intents, highest score first (ties by name)
    ///
    /// Returns a single `general` intent when nothing matches.
    pub fn classify(&self, text: &str) -> Vec<Intent> {
        let padded = format!(" {}", normalize_text(text));

        let mut intents: Vec<Intent> = self
            .intents
            .iter()
            .filter_map(|definition| {
                let matched: Vec<String> = definition
                    .signals
                    .iter()
                    .filter(|signal| padded.contains(&format!(" {signal}")))
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                let score: f64 = matched.iter().map(|s| signal_weight(s)).sum();
                Some(Intent {
                    name: definition.name.clone(),
                    score,
                    confidence: (score / NORMALIZING_SCORE).min(1.0),
                    matched_signals: matched,
                })
            })
            .collect();

        if intents.is_empty() {
            debug!(query = text, "No intent signals matched, degrading to general");
            return vec![Intent::general()];
        }

        intents.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.name.cmp(&b.name))
        });
        intents
    }

    /// Highest-scoring intent
    pub fn primary(&self, text: &str) -> Intent {
        self.classify(text)
            .into_iter()
            .next()
            .unwrap_or_else(Intent::general)
    }
}

fn signal_weight(signal: &str) -> f64 {
    signal.split_whitespace().count() as f64
}

/// Lowercase, replace punctuation with spaces and collapse whitespace
fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Built-in intents for road-trip discovery
pub fn builtin_intents() -> Vec<IntentDefinition> {
    vec![
        IntentDefinition::new(
            "hidden_gems",
            &[
                "hidden gem",
                "off the beaten path",
                "off the beaten track",
                "lesser known",
                "undiscovered",
                "untouristy",
                "secret",
                "authentic",
                "where locals",
            ],
        ),
        IntentDefinition::new(
            "coastal",
            &[
                "coast",
                "beach",
                "seaside",
                "by the sea",
                "ocean",
                "surf",
                "fishing village",
                "cliffs",
                "harbour",
                "harbor",
            ],
        ),
        IntentDefinition::new(
            "foodie",
            &[
                "food",
                "foodie",
                "eat",
                "restaurant",
                "cuisine",
                "tapas",
                "seafood",
                "wine",
                "market",
                "michelin",
                "street food",
            ],
        ),
        IntentDefinition::new(
            "nature",
            &[
                "nature",
                "hike",
                "hiking",
                "mountain",
                "national park",
                "lake",
                "waterfall",
                "forest",
                "outdoors",
                "trail",
            ],
        ),
        IntentDefinition::new(
            "culture",
            &[
                "culture",
                "museum",
                "history",
                "historic",
                "architecture",
                "cathedral",
                "old town",
                "unesco",
                "art",
            ],
        ),
        IntentDefinition::new(
            "nightlife",
            &[
                "nightlife",
                "bars",
                "club",
                "party",
                "live music",
                "late night",
                "dancing",
            ],
        ),
        IntentDefinition::new(
            "family",
            &[
                "family",
                "kids",
                "children",
                "child friendly",
                "kid friendly",
                "toddler",
                "aquarium",
                "theme park",
            ],
        ),
        IntentDefinition::new(
            "romantic",
            &[
                "romantic",
                "romance",
                "honeymoon",
                "couple",
                "anniversary",
                "sunset",
                "date night",
            ],
        ),
        IntentDefinition::new(
            "budget",
            &[
                "budget",
                "cheap",
                "affordable",
                "inexpensive",
                "backpack",
                "low cost",
                "free things",
            ],
        ),
    ]
}
