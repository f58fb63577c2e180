//! HTTP content extractor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use tracing::debug;

use crate::config::ExtractorConfig;
use crate::throttle::parse_retry_after;

use super::{ContentExtractor, ExtractRequest, ExtractResponse, FetchError};

/// Content extractor talking JSON over HTTP (`POST {url}/scrape`).
pub struct HttpExtractor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpExtractor {
    /// Create a new extractor with the given configuration.
    pub fn new(config: &ExtractorConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs as u64);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            timeout,
        }
    }

    fn scrape_url(&self) -> String {
        format!("{}/scrape", self.base_url)
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    fn name(&self) -> &str {
        "http"
    }

    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse, FetchError> {
        debug!(url = %request.url, "Extracting content");

        let mut builder = self.client.post(self.scrape_url()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else if e.is_connect() {
                FetchError::Upstream {
                    message: format!("connection failed: {}", e),
                    transient: true,
                }
            } else {
                FetchError::Upstream {
                    message: e.to_string(),
                    transient: false,
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(FetchError::rate_limited(wait));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Upstream {
                message: format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
                transient: status.is_server_error(),
            });
        }

        response.json().await.map_err(|e| FetchError::Upstream {
            message: format!("Failed to parse response: {}", e),
            transient: false,
        })
    }
}
