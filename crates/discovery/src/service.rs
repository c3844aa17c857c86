//! Search entry point: classify, fan out, fuse, cache

use crate::aggregator::{MultiSourceSearchAggregator, SourceRequest};
use crate::cache::{CacheKey, CachePayload, ResultCache};
use crate::dataset::CityDataset;
use crate::error::{DiscoveryError, Result, SourceFailure};
use crate::fusion::{fuse, RankedResult};
use crate::intent::{Intent, IntentClassifier};
use crate::sources::SourceFilters;
use crate::strategy::{SearchStrategy, StrategyRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wayfinder_core::config::{Config, DiscoveryConfig};
use wayfinder_core::{normalize_name, Clock};
use wayfinder_llm::LanguageModel;

/// A city search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Skip classification and use this intent's strategy
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Only places within `discovery.near_radius_km` of this dataset city
    #[serde(default)]
    pub near_city: Option<String>,
    #[serde(default)]
    pub exclude_cities: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub intent: Intent,
    pub strategy: String,
    pub cities: Vec<RankedResult>,
    pub narrative: String,
    pub confidence: f64,
    pub cached: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable_sources: Vec<SourceFailure>,
}

/// Intent-routed multi-source city search with result caching
pub struct DiscoveryService {
    classifier: IntentClassifier,
    strategies: StrategyRegistry,
    aggregator: MultiSourceSearchAggregator,
    cache: Option<ResultCache>,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    /// Build the service from configuration
    ///
    /// The external source only runs when a model is given and
    /// `discovery.external_enabled` is set.
    pub fn new(
        config: &Config,
        dataset: Arc<CityDataset>,
        model: Option<Arc<dyn LanguageModel>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let model = model.filter(|_| config.discovery.external_enabled);
        let cache = config
            .cache
            .enabled
            .then(|| ResultCache::new(&config.cache, clock));
        Self {
            classifier: IntentClassifier::default(),
            strategies: StrategyRegistry::default(),
            aggregator: MultiSourceSearchAggregator::new(
                dataset,
                model,
                config.discovery.external_max_tokens,
            ),
            cache,
            config: config.discovery.clone(),
        }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn dataset(&self) -> &CityDataset {
        self.aggregator.dataset()
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Drop expired cache entries, returning how many were removed
    pub fn cleanup_cache(&self) -> usize {
        self.cache.as_ref().map_or(0, ResultCache::cleanup)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(DiscoveryError::invalid_request("query must not be empty"));
        }
        let limit = request
            .max_results
            .unwrap_or(self.config.default_max_results)
            .clamp(1, self.config.max_results_limit.max(1));

        let intent = match request.intent.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Intent::explicit(name.to_lowercase()),
            _ => self.classifier.primary(query),
        };
        let strategy = self.strategies.get_strategy(&intent.name);
        let region = request
            .region
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        debug!(intent = %intent.name, strategy = %strategy.name, limit, "Searching");

        let key = CacheKey::new(query, &intent.name, region);
        let cache = self.cache.as_ref().filter(|_| request.near_city.is_none());
        if let Some(entry) = cache.and_then(|c| c.get(&key)) {
            debug!(query, "Serving search from cache");
            let excluded: Vec<String> = request
                .exclude_cities
                .iter()
                .map(|n| normalize_name(n))
                .collect();
            let mut cities: Vec<RankedResult> = entry
                .results
                .iter()
                .filter(|r| !excluded.contains(&r.identity))
                .cloned()
                .collect();
            let filtered = cities.len() != entry.results.len();
            cities.truncate(limit);
            let narrative = if filtered {
                build_narrative(strategy, region, &cities, &[])
            } else {
                entry.narrative.clone()
            };
            let confidence = search_confidence(&intent, entry.coverage);
            return Ok(SearchResponse {
                intent,
                strategy: entry.strategy.clone(),
                cities,
                narrative,
                confidence,
                cached: true,
                unavailable_sources: Vec::new(),
            });
        }

        let near = request
            .near_city
            .as_deref()
            .and_then(|name| self.resolve_near(name));
        let filters = SourceFilters::new(region.map(String::from), near, &request.exclude_cities);
        let source_request = SourceRequest {
            query,
            region,
            near_city: request.near_city.as_deref(),
            exclude: &request.exclude_cities,
            filters,
        };

        let outcome = self.aggregator.execute(strategy, &source_request).await?;
        let failures = outcome.failures();
        let fused = fuse(
            &outcome.candidates,
            strategy,
            self.config.max_results_limit.max(limit),
        );
        let coverage = outcome.coverage();
        let confidence = search_confidence(&intent, coverage);
        let narrative = build_narrative(strategy, region, &fused, &failures);

        let cacheable = request.near_city.is_none()
            && request.exclude_cities.is_empty()
            && failures.is_empty();
        if let Some(cache) = self.cache.as_ref().filter(|_| cacheable) {
            cache.set(
                key,
                CachePayload {
                    results: fused.clone(),
                    narrative: narrative.clone(),
                    confidence,
                    coverage,
                    strategy: strategy.name.clone(),
                },
            );
        }

        let mut cities = fused;
        cities.truncate(limit);
        info!(
            intent = %intent.name,
            results = cities.len(),
            failed_sources = failures.len(),
            "Search complete"
        );
        Ok(SearchResponse {
            intent,
            strategy: strategy.name.clone(),
            cities,
            narrative,
            confidence,
            cached: false,
            unavailable_sources: failures,
        })
    }

    fn resolve_near(&self, name: &str) -> Option<(wayfinder_core::GeoPoint, f64)> {
        match self.dataset().find(name).and_then(|c| c.coordinates) {
            Some(point) => Some((point, self.config.near_radius_km)),
            None => {
                warn!(near_city = name, "Unknown reference city, ignoring radius filter");
                None
            }
        }
    }
}

/// Half intent certainty, half source coverage
fn search_confidence(intent: &Intent, coverage: f64) -> f64 {
    (0.5 * intent.confidence + 0.5 * coverage).clamp(0.0, 1.0)
}

fn build_narrative(
    strategy: &SearchStrategy,
    region: Option<&str>,
    results: &[RankedResult],
    failures: &[SourceFailure],
) -> String {
    let label = strategy.name.replace('_', " ");
    let place = region.map(|r| format!(" in {r}")).unwrap_or_default();

    let mut narrative = match results.first() {
        None => format!("I couldn't find any {label} places{place}. Try broadening the search."),
        Some(top) => {
            let reason = top
                .reasons
                .iter()
                .next()
                .map(|r| format!(" ({})", r.to_lowercase()))
                .unwrap_or_default();
            format!("Top {label} picks{place}, led by {}{reason}.", top.city.name)
        }
    };

    if !failures.is_empty() {
        let names: Vec<&str> = failures.iter().map(|f| f.source_name.as_str()).collect();
        narrative.push_str(&format!(
            " Some sources were unavailable ({}), so results may be incomplete.",
            names.join(", ")
        ));
    }
    narrative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SourceSpec;
    use wayfinder_core::City;

    fn ranked(name: &str, reason: &str) -> RankedResult {
        RankedResult {
            identity: normalize_name(name),
            city: City::named(name, "Portugal"),
            fused_score: 1.0,
            contributing_sources: ["curated".to_string()].into(),
            reasons: [reason.to_string()].into(),
        }
    }

    #[test]
    fn test_narrative_names_top_pick_and_region() {
        let strategy = SearchStrategy::new("hidden_gems", vec![]);
        let narrative = build_narrative(
            &strategy,
            Some("Alentejo"),
            &[ranked("Comporta", "Curated pick for hidden gem")],
            &[],
        );
        assert_eq!(
            narrative,
            "Top hidden gems picks in Alentejo, led by Comporta (curated pick for hidden gem)."
        );
    }

    #[test]
    fn test_narrative_mentions_unavailable_sources() {
        let strategy = SearchStrategy::new(
            "coastal",
            vec![SourceSpec::external("external", "{query}", 1.0)],
        );
        let failures = vec![SourceFailure {
            source_name: "external".to_string(),
            message: "down".to_string(),
        }];
        let narrative = build_narrative(&strategy, None, &[], &failures);
        assert!(narrative.starts_with("I couldn't find any coastal places."));
        assert!(narrative.contains("unavailable (external)"));
    }

    #[test]
    fn test_search_request_deserializes_with_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "beaches"}"#).unwrap();
        assert_eq!(request.query, "beaches");
        assert!(request.exclude_cities.is_empty());
        assert!(request.max_results.is_none());
    }
}
