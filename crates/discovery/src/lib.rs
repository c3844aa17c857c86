//! City discovery for road trips
//!
//! A free-text query is classified into an [`Intent`], which selects a
//! [`SearchStrategy`]. The strategy's sources run concurrently through the
//! [`MultiSourceSearchAggregator`], their candidates are merged by
//! [`fuse`], and the ranked list is cached in a [`ResultCache`].
//! [`DiscoveryService`] ties these together.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod aggregator;
pub mod cache;
pub mod dataset;
pub mod error;
pub mod fusion;
pub mod intent;
pub mod service;
pub mod sources;
pub mod strategy;

pub use aggregator::{AggregateOutcome, MultiSourceSearchAggregator, SourceReport, SourceStatus};
pub use cache::{CacheEntry, CacheKey, ResultCache};
pub use dataset::CityDataset;
pub use error::{DiscoveryError, Result, SourceFailure};
pub use fusion::{fuse, RankedResult};
pub use intent::{Intent, IntentClassifier, IntentDefinition, GENERAL_INTENT};
pub use service::{DiscoveryService, SearchRequest, SearchResponse};
pub use sources::Candidate;
pub use strategy::{SearchStrategy, SourceKind, SourceSpec, StrategyRegistry};
