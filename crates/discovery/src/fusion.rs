//! Merging multi-source candidates into one ranked list
//!
//! Candidates are grouped by identity key. A group's fused score is the sum
//! of the weights of its distinct contributing sources plus the best
//! strategy score among its candidates, so adding a corroborating source
//! never lowers a score and a source never counts twice for one place.
//! Grouping uses ordered maps and every tie is broken on a total order,
//! which makes the ranking independent of source arrival order.

use crate::sources::Candidate;
use crate::strategy::{SearchStrategy, Signal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use wayfinder_core::City;

/// Score added per boost term found
pub const BOOST_INCREMENT: f64 = 1.0;

/// Score removed per penalty term found
pub const PENALTY_INCREMENT: f64 = 1.0;

/// Highlights beyond this count add no coverage
const HIGHLIGHT_SATURATION: usize = 5;

/// One place after fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub identity: String,
    pub city: City,
    pub fused_score: f64,
    pub contributing_sources: BTreeSet<String>,
    pub reasons: BTreeSet<String>,
}

/// Boost and penalty terms plus ranking signals for one city
pub fn strategy_score(city: &City, strategy: &SearchStrategy) -> f64 {
    let text = city.searchable_text();
    let boosts = strategy
        .boost_terms
        .iter()
        .filter(|term| text.contains(term.to_lowercase().as_str()))
        .count() as f64;
    let penalties = strategy
        .penalty_terms
        .iter()
        .filter(|term| text.contains(term.to_lowercase().as_str()))
        .count() as f64;

    let signals: f64 = strategy
        .ranking_signals
        .iter()
        .map(|rs| {
            let value = match rs.signal {
                Signal::Rating => (f64::from(city.rating) / 5.0).clamp(0.0, 1.0),
                Signal::HighlightCoverage => {
                    city.highlights.len().min(HIGHLIGHT_SATURATION) as f64
                        / HIGHLIGHT_SATURATION as f64
                }
            };
            value * rs.weight
        })
        .sum();

    boosts * BOOST_INCREMENT - penalties * PENALTY_INCREMENT + signals
}

#[derive(Default)]
struct Group<'a> {
    source_weights: BTreeMap<&'a str, f64>,
    reasons: BTreeSet<String>,
    best: Option<(f64, &'a Candidate)>,
}

/// Prefer the higher strategy score, then richer data, then source name
fn better(a: (f64, &Candidate), b: (f64, &Candidate)) -> bool {
    a.0.total_cmp(&b.0)
        .then_with(|| {
            a.1.city
                .coordinates
                .is_some()
                .cmp(&b.1.city.coordinates.is_some())
        })
        .then_with(|| b.1.source_name.cmp(&a.1.source_name))
        .then_with(|| b.1.city.name.cmp(&a.1.city.name))
        == Ordering::Greater
}

/// Fuse candidates into at most `limit` ranked results
pub fn fuse(candidates: &[Candidate], strategy: &SearchStrategy, limit: usize) -> Vec<RankedResult> {
    let mut groups: BTreeMap<&str, Group<'_>> = BTreeMap::new();

    for candidate in candidates {
        let group = groups.entry(candidate.identity.as_str()).or_default();

        let weight = group
            .source_weights
            .entry(candidate.source_name.as_str())
            .or_insert(candidate.source_weight);
        *weight = weight.max(candidate.source_weight);

        group.reasons.insert(candidate.match_reason.clone());

        let score = strategy_score(&candidate.city, strategy);
        group.best = match group.best {
            Some(current) if !better((score, candidate), current) => Some(current),
            _ => Some((score, candidate)),
        };
    }

    let mut results: Vec<RankedResult> = groups
        .into_iter()
        .filter_map(|(identity, group)| {
            let (best_score, best) = group.best?;
            let source_total: f64 = group.source_weights.values().sum();
            Some(RankedResult {
                identity: identity.to_string(),
                city: best.city.clone(),
                fused_score: source_total + best_score,
                contributing_sources: group
                    .source_weights
                    .keys()
                    .map(|s| s.to_string())
                    .collect(),
                reasons: group.reasons,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| b.contributing_sources.len().cmp(&a.contributing_sources.len()))
            .then_with(|| a.identity.cmp(&b.identity))
    });
    results.truncate(limit);
    results
}
