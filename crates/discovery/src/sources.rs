//! Candidate producers for each source kind

use crate::dataset::CityDataset;
use crate::error::{DiscoveryError, Result};
use crate::strategy::GeoAttribute;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wayfinder_core::{normalize_name, parse_json, City, GeoPoint};
use wayfinder_llm::{complete_text, format_prompt, LanguageModel};

/// One source's raw match for one place
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub identity: String,
    pub city: City,
    pub source_name: String,
    pub source_weight: f64,
    pub match_reason: String,
}

impl Candidate {
    pub fn new(city: City, source_name: &str, source_weight: f64, match_reason: String) -> Self {
        Self {
            identity: city.identity_key(),
            city,
            source_name: source_name.to_string(),
            source_weight,
            match_reason,
        }
    }
}

/// Filters shared by every source
#[derive(Debug, Clone, Default)]
pub struct SourceFilters {
    /// Region or country name, matched case-insensitively
    pub region: Option<String>,
    /// Centre and radius for proximity searches
    pub near: Option<(GeoPoint, f64)>,
    /// Normalized names to drop
    pub exclude: Vec<String>,
}

impl SourceFilters {
    pub fn new(region: Option<String>, near: Option<(GeoPoint, f64)>, exclude: &[String]) -> Self {
        Self {
            region,
            near,
            exclude: exclude.iter().map(|n| normalize_name(n)).collect(),
        }
    }

    pub fn is_excluded(&self, city: &City) -> bool {
        self.exclude.contains(&city.identity_key())
    }

    fn matches_region(&self, city: &City) -> bool {
        let Some(region) = &self.region else {
            return true;
        };
        let wanted = normalize_name(region);
        normalize_name(&city.country) == wanted
            || city
                .region
                .as_deref()
                .is_some_and(|r| normalize_name(r) == wanted)
    }

    fn within_radius(&self, city: &City) -> bool {
        match (&self.near, city.coordinates) {
            (Some((center, radius_km)), Some(point)) => center.distance_km(&point) <= *radius_km,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Region, radius and exclusion checks for dataset cities
    pub fn accepts(&self, city: &City) -> bool {
        !self.is_excluded(city) && self.matches_region(city) && self.within_radius(city)
    }
}

/// Dataset cities carrying any of `tags` (all cities when empty) rated at least `min_rating`
pub fn curated_candidates(
    dataset: &CityDataset,
    source_name: &str,
    source_weight: f64,
    tags: &[String],
    min_rating: f32,
    filters: &SourceFilters,
) -> Vec<Candidate> {
    dataset
        .cities()
        .iter()
        .filter(|city| city.rating >= min_rating && filters.accepts(city))
        .filter_map(|city| {
            let reason = if tags.is_empty() {
                format!("Rated {:.1} in the city guide", city.rating)
            } else {
                let matched: Vec<&str> = tags
                    .iter()
                    .filter(|t| city.has_tag(t))
                    .map(String::as_str)
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                format!("Curated pick for {}", matched.join(", ").replace('_', " "))
            };
            Some(Candidate::new(city.clone(), source_name, source_weight, reason))
        })
        .collect()
}

/// Dataset cities with a static attribute
pub fn geographic_candidates(
    dataset: &CityDataset,
    source_name: &str,
    source_weight: f64,
    attribute: GeoAttribute,
    filters: &SourceFilters,
) -> Vec<Candidate> {
    dataset
        .cities()
        .iter()
        .filter(|city| match attribute {
            GeoAttribute::Coastal => city.coastal,
            GeoAttribute::Inland => !city.coastal,
        })
        .filter(|city| filters.accepts(city))
        .map(|city| {
            let reason = match attribute {
                GeoAttribute::Coastal => "On the coast",
                GeoAttribute::Inland => "Inland",
            };
            Candidate::new(city.clone(), source_name, source_weight, reason.to_string())
        })
        .collect()
}

const EXTERNAL_SYSTEM_PROMPT: &str = include_str!("../assets/prompts/external_source_system.txt");

/// Shape the external source is asked to return
#[derive(Debug, Deserialize)]
struct ExternalPlace {
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    highlights: Vec<String>,
}

/// Everything the external source needs to build its query
pub struct ExternalQuery<'a> {
    pub query: &'a str,
    pub region: Option<&'a str>,
    pub near_city: Option<&'a str>,
    pub exclude: &'a [String],
    pub max_tokens: u32,
}

/// Ask the language model for places and parse the JSON array it returns
///
/// A response without a parseable array yields no candidates. A provider
/// failure is reported as [`DiscoveryError::SourceUnavailable`].
pub async fn external_candidates(
    model: &dyn LanguageModel,
    dataset: &CityDataset,
    source_name: &str,
    source_weight: f64,
    query_template: &str,
    request: &ExternalQuery<'_>,
    filters: &SourceFilters,
) -> Result<Vec<Candidate>> {
    let constraints = render_constraints(request);
    let prompt = format_prompt(
        query_template,
        &[("query", request.query), ("constraints", &constraints)],
    );

    let text = complete_text(model, EXTERNAL_SYSTEM_PROMPT, &prompt, request.max_tokens)
        .await
        .map_err(|e| DiscoveryError::source_unavailable(source_name, e.to_string()))?;

    let places: Vec<ExternalPlace> = match parse_json(&text) {
        Ok(places) => places,
        Err(e) => {
            warn!(source = source_name, "Discarding unparseable external response: {e}");
            return Ok(Vec::new());
        }
    };
    debug!(source = source_name, count = places.len(), "External source returned places");

    Ok(places
        .into_iter()
        .filter(|p| !p.name.trim().is_empty())
        .filter_map(|place| {
            // Known cities keep dataset attributes so they merge cleanly with curated hits
            let city = match dataset.find(&place.name) {
                Some(known) => {
                    if !filters.accepts(known) {
                        return None;
                    }
                    known.clone()
                }
                None => {
                    let mut city = City::named(place.name.trim(), place.country.trim());
                    city.description = place.description;
                    city.tags = place.tags;
                    city.highlights = place.highlights;
                    if filters.is_excluded(&city) {
                        return None;
                    }
                    city
                }
            };
            let reason = if place.reason.trim().is_empty() {
                "Suggested by travel search".to_string()
            } else {
                place.reason.trim().to_string()
            };
            Some(Candidate::new(city, source_name, source_weight, reason))
        })
        .collect())
}

fn render_constraints(request: &ExternalQuery<'_>) -> String {
    let mut parts = Vec::new();
    if let Some(region) = request.region {
        parts.push(format!("Only places in {region}."));
    }
    if let Some(near) = request.near_city {
        parts.push(format!("Within a short drive of {near}."));
    }
    if !request.exclude.is_empty() {
        parts.push(format!("Do not include: {}.", request.exclude.join(", ")));
    }
    parts.join(" ")
}
