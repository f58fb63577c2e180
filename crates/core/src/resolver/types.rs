//! Types for search resolution.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::throttle::Retryable;

/// Request sent to the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Fully enriched query string.
    pub query: String,
    /// How many organic results to ask for.
    pub num_results: u32,
}

/// A single organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicResult {
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Successful response from the search collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub organic_results: Vec<OrganicResult>,
    /// Primary website from a knowledge panel, if the provider found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph_website: Option<String>,
}

impl SearchResponse {
    /// Build a response from plain links.
    pub fn from_links<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            organic_results: links
                .into_iter()
                .map(|link| OrganicResult {
                    link: link.into(),
                    title: None,
                })
                .collect(),
            knowledge_graph_website: None,
        }
    }
}

/// Options for a single resolution call.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Maximum number of URLs to return.
    pub limit: usize,
    /// Free-text date range hint, e.g. "2024".
    pub date_window: Option<String>,
    /// Free-text domain hint, e.g. "renewable energy".
    pub context: Option<String>,
}

impl ResolveOptions {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn with_date_window(mut self, date_window: Option<String>) -> Self {
        self.date_window = date_window;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }
}

/// Errors from the search collaborator.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// The collaborator answered with an error envelope or a client error.
    #[error("search collaborator error: {0}")]
    Upstream(String),

    /// The collaborator failed on its side (5xx).
    #[error("search collaborator server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// The collaborator could not be reached.
    #[error("search collaborator unreachable: {0}")]
    Unreachable(String),

    /// The collaborator is rate limiting us.
    #[error("search collaborator rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("search timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not have the expected shape.
    #[error("invalid search response: {0}")]
    InvalidResponse(String),
}

impl Retryable for ResolutionError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolutionError::ServerError { .. }
                | ResolutionError::Unreachable(_)
                | ResolutionError::RateLimited { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ResolutionError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// A search-resolution collaborator.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Run one search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ResolutionError>;
}
