//! Mock search backend for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::resolver::{ResolutionError, SearchBackend, SearchRequest, SearchResponse};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The request as sent, after query enrichment.
    pub request: SearchRequest,
    /// When the search was made.
    pub timestamp: Instant,
}

impl std::ops::Deref for RecordedRequest {
    type Target = SearchRequest;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

/// A query handler that produces a response based on the query string.
type QueryHandler = Box<dyn Fn(&str) -> Option<SearchResponse> + Send + Sync>;

/// Mock implementation of the SearchBackend trait.
///
/// - Returns a configurable response (empty by default)
/// - Records every request for assertions
/// - Fails once with a configured error
///
/// # Example
///
/// ```rust,ignore
/// use delver_core::testing::MockSearchBackend;
///
/// let backend = MockSearchBackend::new();
/// backend.set_handler(|query| {
///     query.starts_with("solar").then(|| SearchResponse::from_links(["https://a.com/"]))
/// }).await;
/// ```
pub struct MockSearchBackend {
    /// Response returned when no handler matches.
    response: Arc<RwLock<SearchResponse>>,
    /// Recorded requests.
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    /// If set, the next search will fail with this error.
    next_error: Arc<RwLock<Option<ResolutionError>>>,
    /// Query handler for per-query responses.
    handler: Arc<RwLock<Option<QueryHandler>>>,
}

impl std::fmt::Debug for MockSearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearchBackend")
            .field("response", &"<response>")
            .field("requests", &"<requests>")
            .field("next_error", &"<next_error>")
            .field("handler", &"<handler>")
            .finish()
    }
}

impl Default for MockSearchBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearchBackend {
    /// Create a mock backend that finds nothing.
    pub fn new() -> Self {
        Self {
            response: Arc::new(RwLock::new(SearchResponse::default())),
            requests: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the response returned for subsequent searches.
    pub async fn set_response(&self, response: SearchResponse) {
        *self.response.write().await = response;
    }

    /// Set a handler consulted before the fixed response.
    pub async fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<SearchResponse> + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: ResolutionError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded requests.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Clear recorded requests.
    pub async fn clear_recorded(&self) {
        self.requests.write().await.clear();
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ResolutionError> {
        self.requests.write().await.push(RecordedRequest {
            request: request.clone(),
            timestamp: Instant::now(),
        });

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(handler) = self.handler.read().await.as_ref() {
            if let Some(response) = handler(&request.query) {
                return Ok(response);
            }
        }

        Ok(self.response.read().await.clone())
    }
}
