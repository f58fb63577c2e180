//! HTTP search backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::SearchConfig;
use crate::throttle::parse_retry_after;

use super::{OrganicResult, ResolutionError, SearchBackend, SearchRequest, SearchResponse};

/// Search backend talking JSON over HTTP.
///
/// Sends `POST {url}/search` with `{query, numResults}` and accepts either
/// `{organicResults, knowledgeGraphWebsite}` or an `{error}` envelope.
pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Wire format of the collaborator response, error envelope included.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    knowledge_graph_website: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpSearchBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ResolutionError> {
        debug!(query = %request.query, num_results = request.num_results, "Searching");

        let mut builder = self.client.post(self.search_url()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-KEY", key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ResolutionError::Unreachable(format!("request timed out: {}", e))
            } else if e.is_connect() {
                ResolutionError::Unreachable(e.to_string())
            } else {
                ResolutionError::Upstream(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(ResolutionError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = body.chars().take(200).collect::<String>();
            return Err(if status.is_server_error() {
                ResolutionError::ServerError {
                    status: status.as_u16(),
                    message,
                }
            } else {
                ResolutionError::Upstream(format!("HTTP {}: {}", status, message))
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ResolutionError::InvalidResponse(e.to_string()))?;

        if let Some(error) = wire.error {
            return Err(ResolutionError::Upstream(error));
        }

        debug!(
            query = %request.query,
            results = wire.organic_results.len(),
            "Search complete"
        );

        Ok(SearchResponse {
            organic_results: wire.organic_results,
            knowledge_graph_website: wire.knowledge_graph_website,
        })
    }
}
