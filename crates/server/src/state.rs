//! Service wiring shared by every handler

use std::sync::Arc;
use tracing::info;
use wayfinder_agent::ConversationService;
use wayfinder_core::config::Config;
use wayfinder_core::{Clock, Error, InMemorySessionStore, Result, SessionStore, SystemClock};
use wayfinder_discovery::{CityDataset, DiscoveryService};
use wayfinder_llm::{create_language_model, LanguageModel};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub conversation: Arc<ConversationService>,
    pub model_name: String,
}

impl AppState {
    pub fn new(conversation: Arc<ConversationService>, model_name: impl Into<String>) -> Self {
        Self {
            conversation,
            model_name: model_name.into(),
        }
    }

    /// Production wiring: configured model, dataset, in-memory sessions, system clock
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = create_language_model(&config.llm)
            .map_err(|e| Error::with_context("Failed to create language model", e))?;
        Self::with_model(config, model)
    }

    /// Wiring around an existing model
    pub fn with_model(config: &Config, model: Arc<dyn LanguageModel>) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let dataset = CityDataset::load(&config.discovery)
            .map_err(|e| Error::with_context("Failed to load city dataset", e))?;
        let discovery = Arc::new(DiscoveryService::new(
            config,
            Arc::new(dataset),
            Some(model.clone()),
            clock.clone(),
        ));
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let model_name = model.name().to_string();
        let conversation = Arc::new(ConversationService::new(
            config, model, discovery, store, clock,
        ));
        info!(model = %model_name, "Services initialized");
        Ok(Self::new(conversation, model_name))
    }
}
