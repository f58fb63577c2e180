//! Mock content extractor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::fetcher::{ContentExtractor, ExtractRequest, ExtractResponse, FetchError};

/// Mock implementation of the ContentExtractor trait.
///
/// Responses are looked up by the exact (normalized) URL the fetcher sends.
/// URLs with nothing configured get the default content if one is set,
/// otherwise a failed "not found" response.
pub struct MockExtractor {
    responses: Arc<RwLock<HashMap<String, ExtractResponse>>>,
    default_content: Arc<RwLock<Option<String>>>,
    /// Errors returned by the next calls, oldest first.
    errors: Arc<RwLock<VecDeque<FetchError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    requests: Arc<RwLock<Vec<ExtractRequest>>>,
}

impl std::fmt::Debug for MockExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockExtractor")
            .field("responses", &"<responses>")
            .field("default_content", &"<default_content>")
            .field("errors", &"<errors>")
            .field("delay", &"<delay>")
            .field("requests", &"<requests>")
            .finish()
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            default_content: Arc::new(RwLock::new(None)),
            errors: Arc::new(RwLock::new(VecDeque::new())),
            delay: Arc::new(RwLock::new(None)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Serve `content` for `url`.
    pub async fn set_content(&self, url: &str, content: &str) {
        self.set_response(url, ExtractResponse::ok(content)).await;
    }

    /// Serve a raw response for `url`.
    pub async fn set_response(&self, url: &str, response: ExtractResponse) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), response);
    }

    /// Serve `content` for every URL without its own response.
    pub async fn set_default_content(&self, content: &str) {
        *self.default_content.write().await = Some(content.to_string());
    }

    /// Queue an error for the next call.
    pub async fn push_error(&self, error: FetchError) {
        self.errors.write().await.push_back(error);
    }

    /// Delay every call by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Get the number of extraction calls made.
    pub async fn call_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Get the URLs requested so far, in call order.
    pub async fn requested_urls(&self) -> Vec<String> {
        self.requests
            .read()
            .await
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }
}

#[async_trait]
impl ContentExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse, FetchError> {
        // Recorded before the delay so concurrent callers are visible.
        self.requests.write().await.push(request.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.errors.write().await.pop_front() {
            return Err(error);
        }

        if let Some(response) = self.responses.read().await.get(&request.url) {
            return Ok(response.clone());
        }

        Ok(match self.default_content.read().await.as_ref() {
            Some(content) => ExtractResponse::ok(content.clone()),
            None => ExtractResponse::failed(format!("no content for {}", request.url)),
        })
    }
}
