//! Concurrent fan-out over a strategy's sources

use crate::dataset::CityDataset;
use crate::error::{DiscoveryError, Result, SourceFailure};
use crate::sources::{
    curated_candidates, external_candidates, geographic_candidates, Candidate, ExternalQuery,
    SourceFilters,
};
use crate::strategy::{SearchStrategy, SourceKind, SourceSpec};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use wayfinder_llm::LanguageModel;

/// Query parameters shared by every source in one search
#[derive(Debug, Clone)]
pub struct SourceRequest<'a> {
    pub query: &'a str,
    pub region: Option<&'a str>,
    pub near_city: Option<&'a str>,
    pub exclude: &'a [String],
    pub filters: SourceFilters,
}

/// What happened to one source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Returned { count: usize },
    Failed { message: String },
    /// External source with no language model configured
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source_name: String,
    pub weight: f64,
    #[serde(flatten)]
    pub status: SourceStatus,
}

/// Candidates from every surviving source plus per-source reports
#[derive(Debug, Clone, Default)]
pub struct AggregateOutcome {
    pub candidates: Vec<Candidate>,
    pub reports: Vec<SourceReport>,
}

impl AggregateOutcome {
    pub fn failures(&self) -> Vec<SourceFailure> {
        self.reports
            .iter()
            .filter_map(|r| match &r.status {
                SourceStatus::Failed { message } => Some(SourceFailure {
                    source_name: r.source_name.clone(),
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Weight share of surviving sources that found at least one place
    ///
    /// Failed and skipped sources are left out of both sides of the ratio.
    pub fn coverage(&self) -> f64 {
        let mut total = 0.0;
        let mut productive = 0.0;
        for report in &self.reports {
            if let SourceStatus::Returned { count } = report.status {
                total += report.weight;
                if count > 0 {
                    productive += report.weight;
                }
            }
        }
        if total > 0.0 {
            (productive / total).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Runs each source of a strategy and collects what survives
pub struct MultiSourceSearchAggregator {
    dataset: Arc<CityDataset>,
    model: Option<Arc<dyn LanguageModel>>,
    external_max_tokens: u32,
}

impl MultiSourceSearchAggregator {
    pub fn new(
        dataset: Arc<CityDataset>,
        model: Option<Arc<dyn LanguageModel>>,
        external_max_tokens: u32,
    ) -> Self {
        Self {
            dataset,
            model,
            external_max_tokens,
        }
    }

    pub fn dataset(&self) -> &CityDataset {
        &self.dataset
    }

    /// Run every source concurrently
    ///
    /// Source failures are logged and reported but only fail the search
    /// when no source that ran succeeded.
    pub async fn execute(
        &self,
        strategy: &SearchStrategy,
        request: &SourceRequest<'_>,
    ) -> Result<AggregateOutcome> {
        let runs = strategy
            .sources
            .iter()
            .map(|spec| self.run_source(spec, request));
        let results = join_all(runs).await;

        let mut outcome = AggregateOutcome::default();
        let mut ran = 0usize;
        for (spec, result) in strategy.sources.iter().zip(results) {
            let status = match result {
                Ok(Some(candidates)) => {
                    ran += 1;
                    debug!(source = %spec.name, count = candidates.len(), "Source returned");
                    let count = candidates.len();
                    outcome.candidates.extend(candidates);
                    SourceStatus::Returned { count }
                }
                Ok(None) => SourceStatus::Skipped,
                Err(e) => {
                    ran += 1;
                    warn!(source = %spec.name, strategy = %strategy.name, "Search source failed: {e}");
                    let message = match e {
                        DiscoveryError::SourceUnavailable { message, .. } => message,
                        other => other.to_string(),
                    };
                    SourceStatus::Failed { message }
                }
            };
            outcome.reports.push(SourceReport {
                source_name: spec.name.clone(),
                weight: spec.weight,
                status,
            });
        }

        let failures = outcome.failures();
        if ran > 0 && failures.len() == ran {
            return Err(DiscoveryError::AllSourcesFailed { failures });
        }
        Ok(outcome)
    }

    /// `Ok(None)` when the source cannot run in this configuration
    async fn run_source(
        &self,
        spec: &SourceSpec,
        request: &SourceRequest<'_>,
    ) -> Result<Option<Vec<Candidate>>> {
        match &spec.kind {
            SourceKind::Curated { tags, min_rating } => Ok(Some(curated_candidates(
                &self.dataset,
                &spec.name,
                spec.weight,
                tags,
                *min_rating,
                &request.filters,
            ))),
            SourceKind::Geographic { attribute } => Ok(Some(geographic_candidates(
                &self.dataset,
                &spec.name,
                spec.weight,
                *attribute,
                &request.filters,
            ))),
            SourceKind::External { query_template } => {
                let Some(model) = &self.model else {
                    debug!(source = %spec.name, "No language model configured, skipping");
                    return Ok(None);
                };
                let query = ExternalQuery {
                    query: request.query,
                    region: request.region,
                    near_city: request.near_city,
                    exclude: request.exclude,
                    max_tokens: self.external_max_tokens,
                };
                external_candidates(
                    model.as_ref(),
                    &self.dataset,
                    &spec.name,
                    spec.weight,
                    query_template,
                    &query,
                    &request.filters,
                )
                .await
                .map(Some)
            }
        }
    }
}
