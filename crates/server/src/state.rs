use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use delver_core::{
    Collaborators, Config, ContentExtractor, Refiner, ResearchOrchestrator, SanitizedConfig,
    SearchBackend,
};

/// Shared application state
pub struct AppState {
    config: Config,
    search: Option<Arc<dyn SearchBackend>>,
    extractor: Option<Arc<dyn ContentExtractor>>,
    refiner: Option<Arc<dyn Refiner>>,
    sessions: RwLock<HashMap<String, Arc<ResearchOrchestrator>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        search: Option<Arc<dyn SearchBackend>>,
        extractor: Option<Arc<dyn ContentExtractor>>,
        refiner: Option<Arc<dyn Refiner>>,
    ) -> Self {
        Self {
            config,
            search,
            extractor,
            refiner,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// All three collaborators, or `None` if any is missing.
    pub fn collaborators(&self) -> Option<Collaborators> {
        Some(Collaborators {
            search: Arc::clone(self.search.as_ref()?),
            extractor: Arc::clone(self.extractor.as_ref()?),
            refiner: Arc::clone(self.refiner.as_ref()?),
        })
    }

    /// Build and register a fresh session. Each session owns its cache and
    /// rate limiter.
    pub async fn create_session(&self, collaborators: Collaborators) -> Arc<ResearchOrchestrator> {
        let mut orchestrator =
            ResearchOrchestrator::new(self.config.research.clone(), collaborators);
        if let Some(search) = &self.config.search {
            orchestrator = orchestrator.with_search_config(search);
        }
        if let Some(extractor) = &self.config.extractor {
            orchestrator = orchestrator.with_extractor_config(extractor);
        }

        let orchestrator = Arc::new(orchestrator);
        self.sessions
            .write()
            .await
            .insert(orchestrator.id().to_string(), Arc::clone(&orchestrator));
        orchestrator
    }

    pub async fn session(&self, id: &str) -> Option<Arc<ResearchOrchestrator>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn sessions(&self) -> Vec<Arc<ResearchOrchestrator>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn remove_session(&self, id: &str) -> Option<Arc<ResearchOrchestrator>> {
        self.sessions.write().await.remove(id)
    }

    /// Cancel every running session.
    pub async fn cancel_all(&self) {
        for session in self.sessions().await {
            if session.is_running() {
                info!(session_id = %session.id(), "Canceling session for shutdown");
                session.cancel().await;
            }
        }
    }
}
