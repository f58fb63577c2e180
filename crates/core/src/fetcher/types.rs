//! Types for content fetching.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::throttle::Retryable;

/// Request sent to the content-extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub url: String,
    /// Pages to follow from `url`; always 1 for single-page fetches.
    pub page_limit: u32,
    /// Output formats, e.g. `["markdown"]`.
    pub formats: Vec<String>,
}

/// Response from the content-extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractResponse {
    /// A successful response carrying `content`.
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            metadata: None,
            error: None,
        }
    }

    /// A failed response carrying `error`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            metadata: None,
            error: Some(error.into()),
        }
    }
}

/// Content fetched from one URL.
///
/// Created once per successful fetch and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingResult {
    /// Normalized URL the content came from.
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Search target this URL was resolved from.
    pub source_target: String,
    pub fetched_at: DateTime<Utc>,
}

/// Errors from fetching a single URL.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Syntactically invalid URL or a disallowed host. Never reaches the network.
    #[error("invalid url: {0}")]
    Invalid(String),

    /// Denied by the local rate limiter or by the collaborator (HTTP 429).
    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("fetch timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The collaborator failed. `transient` failures are worth retrying.
    #[error("content extraction failed: {message}")]
    Upstream { message: String, transient: bool },

    /// The page was reachable but had nothing usable.
    #[error("page has no extractable content")]
    EmptyContent,
}

impl FetchError {
    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Invalid(_) => "invalid",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Upstream { .. } => "upstream_error",
            FetchError::EmptyContent => "empty_content",
        }
    }

    pub fn rate_limited(wait: Option<Duration>) -> Self {
        FetchError::RateLimited {
            retry_after_ms: wait.map(|d| d.as_millis() as u64),
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited { .. } => true,
            FetchError::Upstream { transient, .. } => *transient,
            FetchError::Invalid(_) | FetchError::Timeout { .. } | FetchError::EmptyContent => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// A content-extraction collaborator.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extractor name for logs.
    fn name(&self) -> &str;

    /// Extract the content of one page.
    ///
    /// Transport failures are errors; a collaborator-side failure may also
    /// come back as `Ok` with `success: false`.
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse, FetchError>;
}
