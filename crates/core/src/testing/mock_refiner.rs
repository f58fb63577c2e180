//! Mock refiner for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::refiner::{
    PlanRequest, Refinement, RefinementError, RefinementRequest, Refiner, ResearchPlan,
};

/// Mock implementation of the Refiner trait.
///
/// Queued refinements are handed out one per call. Once the queue is empty
/// every call answers with no improved targets, which ends a session.
pub struct MockRefiner {
    refinements: Arc<RwLock<VecDeque<Refinement>>>,
    plan: Arc<RwLock<Option<ResearchPlan>>>,
    next_error: Arc<RwLock<Option<RefinementError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    requests: Arc<RwLock<Vec<RefinementRequest>>>,
}

impl std::fmt::Debug for MockRefiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRefiner")
            .field("refinements", &"<refinements>")
            .field("plan", &"<plan>")
            .field("next_error", &"<next_error>")
            .field("requests", &"<requests>")
            .finish()
    }
}

impl Default for MockRefiner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRefiner {
    pub fn new() -> Self {
        Self {
            refinements: Arc::new(RwLock::new(VecDeque::new())),
            plan: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue a refinement proposing `targets`.
    pub async fn push_targets(&self, targets: &[&str]) {
        self.push_refinement(Refinement {
            analysis: format!("continue with {} targets", targets.len()),
            improved_targets: targets.iter().map(|t| t.to_string()).collect(),
            extraction_focus: None,
        })
        .await;
    }

    /// Queue a refinement.
    pub async fn push_refinement(&self, refinement: Refinement) {
        self.refinements.write().await.push_back(refinement);
    }

    /// Set the plan returned by `plan`.
    pub async fn set_plan(&self, plan: ResearchPlan) {
        *self.plan.write().await = Some(plan);
    }

    /// Configure the next refine or plan call to fail.
    pub async fn set_next_error(&self, error: RefinementError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every call by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Get recorded refinement requests.
    pub async fn recorded_requests(&self) -> Vec<RefinementRequest> {
        self.requests.read().await.clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Refiner for MockRefiner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, RefinementError> {
        self.requests.write().await.push(request.clone());
        self.pause().await;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self
            .refinements
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| Refinement {
                analysis: "goals covered".to_string(),
                ..Refinement::default()
            })
            .normalized())
    }

    async fn plan(&self, request: &PlanRequest) -> Result<ResearchPlan, RefinementError> {
        self.pause().await;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        match self.plan.read().await.clone() {
            Some(plan) => Ok(plan),
            None => Ok(ResearchPlan {
                search_targets: vec![request.question.clone()],
                research_goals: Vec::new(),
            }),
        }
    }
}
