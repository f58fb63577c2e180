//! Types for the refinement collaborator.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::ScrapingResult;
use crate::throttle::Retryable;

use super::llm::LlmError;

/// Characters of page content sent per result.
pub const DEFAULT_EXCERPT_CHARS: usize = 1_500;

/// Condensed view of one fetched result sent for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDigest {
    pub url: String,
    pub source_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Leading part of the page content.
    pub excerpt: String,
}

impl ResultDigest {
    /// Digest `result`, keeping at most `max_chars` characters of content.
    pub fn from_result(result: &ScrapingResult, max_chars: usize) -> Self {
        Self {
            url: result.url.clone(),
            source_target: result.source_target.clone(),
            title: result
                .metadata
                .get("title")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            excerpt: result.content.chars().take(max_chars).collect(),
        }
    }
}

/// Request for one refinement step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementRequest {
    /// Targets searched in the round under review.
    pub search_targets: Vec<String>,
    /// Everything accumulated so far in the session.
    pub current_results: Vec<ResultDigest>,
    pub research_goals: Vec<String>,
    /// One-based round number.
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// The collaborator's verdict on a round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refinement {
    #[serde(default)]
    pub analysis: String,
    /// Targets for the next round. Empty means the research is done.
    #[serde(default)]
    pub improved_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_focus: Option<String>,
}

impl Refinement {
    /// Trim targets, drop blanks and repeats.
    pub fn normalized(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.improved_targets = self
            .improved_targets
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
            .collect();
        self
    }
}

/// Request for an initial research plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Initial targets and goals derived from a research question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPlan {
    #[serde(default)]
    pub search_targets: Vec<String>,
    #[serde(default)]
    pub research_goals: Vec<String>,
}

/// Errors from the refinement collaborator.
#[derive(Debug, Error)]
pub enum RefinementError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Transport failure talking to an HTTP refiner.
    #[error("refiner unreachable: {0}")]
    Http(String),

    #[error("refiner error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("invalid refiner response: {0}")]
    InvalidResponse(String),

    #[error("refinement timed out after {0:?}")]
    Timeout(Duration),

    #[error("refiner not configured")]
    NotConfigured,
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

impl Retryable for RefinementError {
    fn is_retryable(&self) -> bool {
        match self {
            RefinementError::Http(_) => true,
            RefinementError::Api { status, .. } => is_retryable_status(*status),
            RefinementError::Llm(LlmError::Http(_)) => true,
            RefinementError::Llm(LlmError::Api { status, .. }) => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// The reasoning collaborator that reviews rounds and plans research.
#[async_trait]
pub trait Refiner: Send + Sync {
    /// Refiner name for logs.
    fn name(&self) -> &str;

    /// Review the accumulated results and propose the next targets.
    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, RefinementError>;

    /// Turn a research question into first-round targets and goals.
    async fn plan(&self, request: &PlanRequest) -> Result<ResearchPlan, RefinementError>;
}
