//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use lmra_fetch::RepoSource;
use lmra_ollama::ModelService;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::pipeline::Pipeline;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Analysis-history store.
    pub store: Arc<SqliteStore>,
    /// Model runner used by the relay and the analysis pipelines.
    pub model: Arc<dyn ModelService>,
    /// Repository host used by the analysis pipelines.
    pub repos: Arc<dyn RepoSource>,
}

impl AppState {
    /// An analysis pipeline over this state's store and upstream clients.
    pub fn pipeline(&self) -> Pipeline<SqliteStore> {
        Pipeline::new(
            Arc::clone(&self.store),
            Arc::clone(&self.repos),
            Arc::clone(&self.model),
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
