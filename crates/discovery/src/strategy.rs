//! Declarative search strategies keyed by intent

use crate::intent::GENERAL_INTENT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static city attribute a geographic source filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoAttribute {
    Coastal,
    Inland,
}

/// How a source produces candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Reference dataset filtered by tags (any match) and minimum rating
    Curated {
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        min_rating: f32,
    },
    /// Reference dataset filtered by a static attribute
    Geographic { attribute: GeoAttribute },
    /// Free-text query to the language model
    External { query_template: String },
}

/// One configured source in a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: SourceKind,
    pub weight: f64,
}

impl SourceSpec {
    pub fn curated(name: &str, tags: &[&str], min_rating: f32, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: SourceKind::Curated {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                min_rating,
            },
            weight: weight.max(0.0),
        }
    }

    pub fn geographic(name: &str, attribute: GeoAttribute, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: SourceKind::Geographic { attribute },
            weight: weight.max(0.0),
        }
    }

    pub fn external(name: &str, query_template: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: SourceKind::External {
                query_template: query_template.to_string(),
            },
            weight: weight.max(0.0),
        }
    }
}

/// Per-city quality signals folded into the strategy score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// rating / 5
    Rating,
    /// Number of highlights, saturating at five
    HighlightCoverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingSignal {
    pub signal: Signal,
    pub weight: f64,
}

/// Recipe for searching and scoring candidates for one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStrategy {
    pub name: String,
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub ranking_signals: Vec<RankingSignal>,
    #[serde(default)]
    pub boost_terms: Vec<String>,
    #[serde(default)]
    pub penalty_terms: Vec<String>,
}

impl SearchStrategy {
    pub fn new(name: &str, sources: Vec<SourceSpec>) -> Self {
        Self {
            name: name.to_string(),
            sources,
            ranking_signals: Vec::new(),
            boost_terms: Vec::new(),
            penalty_terms: Vec::new(),
        }
    }

    pub fn with_signal(mut self, signal: Signal, weight: f64) -> Self {
        self.ranking_signals.push(RankingSignal { signal, weight });
        self
    }

    pub fn with_boost_terms(mut self, terms: &[&str]) -> Self {
        self.boost_terms = terms.iter().map(|t| t.to_lowercase()).collect();
        self
    }

    pub fn with_penalty_terms(mut self, terms: &[&str]) -> Self {
        self.penalty_terms = terms.iter().map(|t| t.to_lowercase()).collect();
        self
    }
}

/// Lookup from intent name to strategy, falling back to `general`
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    general: SearchStrategy,
    strategies: HashMap<String, SearchStrategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(builtin_strategies())
    }
}

impl StrategyRegistry {
    /// Build a registry; a strategy named `general` replaces the built-in fallback
    pub fn new(strategies: Vec<SearchStrategy>) -> Self {
        let mut general = general_strategy();
        let mut map = HashMap::new();
        for strategy in strategies {
            if strategy.name == GENERAL_INTENT {
                general = strategy;
            } else {
                map.insert(strategy.name.clone(), strategy);
            }
        }
        Self {
            general,
            strategies: map,
        }
    }

    /// Built-in strategies plus custom ones, custom winning on name clashes
    pub fn with_custom(custom: Vec<SearchStrategy>) -> Self {
        let mut strategies = builtin_strategies();
        strategies.extend(custom);
        Self::new(strategies)
    }

    pub fn get_strategy(&self, intent_name: &str) -> &SearchStrategy {
        self.strategies.get(intent_name).unwrap_or(&self.general)
    }

    pub fn contains(&self, intent_name: &str) -> bool {
        intent_name == GENERAL_INTENT || self.strategies.contains_key(intent_name)
    }

    /// Registered names, sorted, including `general`
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.push(self.general.name.clone());
        names.sort();
        names
    }
}

const EXTERNAL_TEMPLATE: &str =
    "Suggest {kind} towns or cities for a road trip. Traveller request: \"{query}\". {constraints}";

fn external(kind: &str, weight: f64) -> SourceSpec {
    SourceSpec::external(
        "external",
        &EXTERNAL_TEMPLATE.replace("{kind}", kind),
        weight,
    )
}

fn general_strategy() -> SearchStrategy {
    SearchStrategy::new(
        GENERAL_INTENT,
        vec![
            SourceSpec::curated("curated", &[], 4.0, 1.0),
            external("well-loved", 1.0),
        ],
    )
    .with_signal(Signal::Rating, 2.0)
    .with_signal(Signal::HighlightCoverage, 0.5)
    .with_penalty_terms(&["crowded", "touristy"])
}

/// Built-in strategies for every built-in intent plus `general`
pub fn builtin_strategies() -> Vec<SearchStrategy> {
    vec![
        general_strategy(),
        SearchStrategy::new(
            "hidden_gems",
            vec![
                SourceSpec::curated("curated", &["hidden_gem"], 4.0, 1.5),
                external("lesser-known, authentic", 1.0),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_boost_terms(&["hidden", "quiet", "authentic", "village", "undiscovered"])
        .with_penalty_terms(&["crowded", "touristy", "resort"]),
        SearchStrategy::new(
            "coastal",
            vec![
                SourceSpec::geographic("coastline", GeoAttribute::Coastal, 1.5),
                SourceSpec::curated("curated", &["beach", "coastal"], 4.0, 1.0),
                external("coastal", 0.8),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_boost_terms(&["beach", "cliffs", "surf", "seafood", "coastal"])
        .with_penalty_terms(&["crowded", "high-rise"]),
        SearchStrategy::new(
            "foodie",
            vec![
                SourceSpec::curated("curated", &["food", "wine"], 4.0, 1.5),
                external("food-focused", 1.0),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_signal(Signal::HighlightCoverage, 0.5)
        .with_boost_terms(&["market", "seafood", "wine", "tapas", "pintxos", "cooking"])
        .with_penalty_terms(&["touristy"]),
        SearchStrategy::new(
            "nature",
            vec![
                SourceSpec::curated("curated", &["nature", "hiking", "mountains"], 4.0, 1.5),
                external("nature and hiking", 1.0),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_boost_terms(&["trail", "national park", "lake", "waterfall", "gorge"])
        .with_penalty_terms(&["high-rise", "crowded"]),
        SearchStrategy::new(
            "culture",
            vec![
                SourceSpec::curated("curated", &["culture", "history"], 4.0, 1.5),
                external("historic and cultural", 1.0),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_signal(Signal::HighlightCoverage, 0.5)
        .with_boost_terms(&["museum", "cathedral", "unesco", "roman", "palace", "library"]),
        SearchStrategy::new(
            "nightlife",
            vec![
                SourceSpec::curated("curated", &["nightlife"], 3.5, 1.5),
                external("lively nightlife", 0.8),
            ],
        )
        .with_signal(Signal::Rating, 1.5)
        .with_boost_terms(&["bars", "late-night", "fado", "flamenco", "student"])
        .with_penalty_terms(&["quiet", "sleepy"]),
        SearchStrategy::new(
            "family",
            vec![
                SourceSpec::curated("curated", &["family"], 4.0, 1.5),
                SourceSpec::geographic("coastline", GeoAttribute::Coastal, 0.5),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_boost_terms(&["castle", "boat", "lagoon", "cable car", "beach"])
        .with_penalty_terms(&["party", "nightlife"]),
        SearchStrategy::new(
            "romantic",
            vec![
                SourceSpec::curated("curated", &["romantic"], 4.2, 1.5),
                external("romantic", 1.0),
            ],
        )
        .with_signal(Signal::Rating, 2.0)
        .with_boost_terms(&["sunset", "views", "vineyards", "hilltop", "palace"])
        .with_penalty_terms(&["party", "crowded"]),
        SearchStrategy::new(
            "budget",
            vec![
                SourceSpec::curated("curated", &["budget"], 3.5, 1.5),
                external("affordable", 0.8),
            ],
        )
        .with_signal(Signal::Rating, 1.5)
        .with_boost_terms(&["free", "affordable", "market", "student"])
        .with_penalty_terms(&["luxury", "expensive", "belle-époque"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentClassifier;

    #[test]
    fn test_every_builtin_intent_has_a_strategy() {
        let registry = StrategyRegistry::default();
        let classifier = IntentClassifier::default();
        for name in classifier.intent_names() {
            assert!(registry.contains(name), "missing strategy for {name}");
            assert_eq!(registry.get_strategy(name).name, name);
        }
    }

    #[test]
    fn test_unknown_intent_falls_back_to_general() {
        let registry = StrategyRegistry::default();
        assert_eq!(registry.get_strategy("space_tourism").name, GENERAL_INTENT);
        assert!(!registry.contains("space_tourism"));
    }

    #[test]
    fn test_custom_strategy_overrides_builtin() {
        let custom = SearchStrategy::new(
            "coastal",
            vec![SourceSpec::curated("curated", &["beach"], 0.0, 3.0)],
        );
        let registry = StrategyRegistry::with_custom(vec![custom]);
        let strategy = registry.get_strategy("coastal");
        assert_eq!(strategy.sources.len(), 1);
        assert_eq!(strategy.sources[0].name, "curated");
        assert_eq!(strategy.sources[0].weight, 3.0);
    }

    #[test]
    fn test_negative_weights_clamped() {
        let spec = SourceSpec::curated("curated", &[], 0.0, -2.0);
        assert_eq!(spec.weight, 0.0);
    }

    #[test]
    fn test_source_spec_serializes_flat() {
        let spec = SourceSpec::geographic("coastline", GeoAttribute::Coastal, 1.5);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "geographic");
        assert_eq!(json["attribute"], "coastal");
        assert_eq!(json["weight"], 1.5);
    }

    #[test]
    fn test_names_sorted_and_include_general() {
        let names = StrategyRegistry::default().names();
        assert!(names.contains(&GENERAL_INTENT.to_string()));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
