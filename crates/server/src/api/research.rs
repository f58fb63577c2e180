//! Research session API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use delver_core::{
    orchestrator::ResearchIteration,
    refiner::{PlanRequest, ResearchPlan},
    ResearchOrchestrator, ResearchParams, ScrapingResult, SessionSnapshot,
};

use super::handlers::{api_error, ApiError};
use crate::metrics::SESSIONS_CREATED_TOTAL;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a research session
#[derive(Debug, Default, Deserialize)]
pub struct CreateResearchBody {
    /// First round's search targets
    pub targets: Option<Vec<String>>,
    /// Research question; used to plan targets when none are given
    pub question: Option<String>,
    /// Goals handed to the refiner each round
    pub goals: Option<Vec<String>>,
    /// Date-range hint for searches, e.g. "2024"
    pub date_window: Option<String>,
    /// Domain hint for searches
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateResearchResponse {
    pub session_id: String,
    pub search_targets: Vec<String>,
    pub research_goals: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionSnapshot>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub history: Vec<ResearchIteration>,
}

/// Query parameters for listing results
#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    /// Only results originating from this search target
    pub source_target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub session_id: String,
    pub results: Vec<ScrapingResult>,
    pub total: usize,
}

fn clean(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

async fn find_session(
    state: &AppState,
    id: &str,
) -> Result<Arc<ResearchOrchestrator>, ApiError> {
    state
        .session(id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session not found: {}", id)))
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a research session. The session runs in the background; progress
/// is available through the snapshot and events endpoints.
pub async fn create_research(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateResearchBody>,
) -> Result<(StatusCode, Json<CreateResearchResponse>), ApiError> {
    let collaborators = state.collaborators().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Search, extractor and refiner must all be configured",
        )
    })?;

    let mut targets = clean(body.targets);
    let mut goals = clean(body.goals);
    let question = body
        .question
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    if targets.is_empty() {
        let Some(question) = question.as_ref() else {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Provide at least one target or a question",
            ));
        };

        let request = PlanRequest {
            question: question.clone(),
            context: body.context.clone(),
        };
        let ResearchPlan {
            search_targets,
            research_goals,
        } = collaborators.refiner.plan(&request).await.map_err(|e| {
            warn!(error = %e, "Research planning failed");
            api_error(StatusCode::BAD_GATEWAY, format!("Planning failed: {}", e))
        })?;

        targets = clean(Some(search_targets));
        if targets.is_empty() {
            return Err(api_error(
                StatusCode::BAD_GATEWAY,
                "Planner proposed no search targets",
            ));
        }
        if goals.is_empty() {
            goals = clean(Some(research_goals));
        }
    }

    if goals.is_empty() {
        goals.extend(question);
    }

    let params = ResearchParams {
        search_targets: targets.clone(),
        research_goals: goals.clone(),
        date_window: body.date_window,
        context: body.context,
    };

    let orchestrator = state.create_session(collaborators).await;
    SESSIONS_CREATED_TOTAL.inc();
    let session_id = orchestrator.id().to_string();
    info!(session_id = %session_id, targets = targets.len(), "Research session created");

    tokio::spawn(async move {
        match orchestrator.run(params).await {
            Ok(outcome) => info!(
                session_id = %outcome.session_id,
                state = %outcome.state,
                results = outcome.results.len(),
                "Research session finished"
            ),
            Err(e) => warn!(session_id = %orchestrator.id(), error = %e, "Research session failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateResearchResponse {
            session_id,
            search_targets: targets,
            research_goals: goals,
        }),
    ))
}

/// List all registered sessions, newest first
pub async fn list_research(State(state): State<Arc<AppState>>) -> Json<ListSessionsResponse> {
    let mut sessions = Vec::new();
    for session in state.sessions().await {
        sessions.push(session.snapshot().await);
    }
    sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let total = sessions.len();
    Json(ListSessionsResponse { sessions, total })
}

/// Get a session's snapshot and round history
pub async fn get_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(SessionDetailResponse {
        snapshot: session.snapshot().await,
        history: session.history().await,
    }))
}

/// Get accumulated results, optionally only those from one search target
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ResultsParams>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let session = find_session(&state, &id).await?;

    let mut results = session.results().await;
    if let Some(source) = params.source_target.as_deref() {
        results.retain(|r| r.source_target == source);
    }

    let total = results.len();
    Ok(Json(ResultsResponse {
        session_id: id,
        results,
        total,
    }))
}

/// Ask a session to stop at the next unit-of-work boundary
pub async fn cancel_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &id).await?;
    session.cancel().await;
    Ok(Json(session.snapshot().await))
}

/// Cancel a session and forget it
pub async fn delete_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state
        .remove_session(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session not found: {}", id)))?;

    session.cancel().await;
    info!(session_id = %id, "Research session removed");
    Ok(Json(session.snapshot().await))
}
