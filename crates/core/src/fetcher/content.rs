//! Rate-limited, retried, cached content fetching.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::{FETCH_ATTEMPTS, FETCH_DURATION, RATE_LIMIT_REJECTIONS};
use crate::target::{is_blocked, normalize_url, BlockRule, ResolvedUrl};
use crate::throttle::{with_timeout, RateLimiter, RetryPolicy};

use super::{ContentExtractor, ExtractRequest, ExtractResponse, FetchCache, FetchError, ScrapingResult};

/// Fetches single pages through the extraction collaborator.
///
/// One instance belongs to one research session: the cache and the rate
/// limiter it holds are never shared across sessions.
pub struct ContentFetcher {
    extractor: Arc<dyn ContentExtractor>,
    limiter: Arc<RateLimiter>,
    cache: Arc<FetchCache>,
    retry: RetryPolicy,
    block_rules: Vec<BlockRule>,
    page_limit: u32,
    formats: Vec<String>,
}

impl ContentFetcher {
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        limiter: Arc<RateLimiter>,
        cache: Arc<FetchCache>,
    ) -> Self {
        Self {
            extractor,
            limiter,
            cache,
            retry: RetryPolicy::none(),
            block_rules: Vec::new(),
            page_limit: 1,
            formats: vec!["markdown".to_string()],
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// URLs rejected before any network call.
    pub fn with_block_rules(mut self, rules: Vec<BlockRule>) -> Self {
        self.block_rules = rules;
        self
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_formats(mut self, formats: Vec<String>) -> Self {
        self.formats = formats;
        self
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch one URL.
    ///
    /// Validation and cache hits never touch the rate limiter. A limiter
    /// denial fails fast with `RateLimited`; backing off is the caller's job.
    pub async fn fetch(
        &self,
        target: &ResolvedUrl,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScrapingResult, FetchError> {
        let result = self.fetch_inner(target, timeout, cancel).await;
        if let Err(e) = &result {
            FETCH_ATTEMPTS.with_label_values(&[e.kind()]).inc();
        }
        result
    }

    async fn fetch_inner(
        &self,
        target: &ResolvedUrl,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScrapingResult, FetchError> {
        let key = normalize_url(&target.url)
            .ok_or_else(|| FetchError::Invalid(target.url.clone()))?;
        if is_blocked(&key, &self.block_rules) {
            return Err(FetchError::Invalid(format!("disallowed host: {}", key)));
        }

        let _slot = self.cache.lock_url(&key).await;

        if let Some(hit) = self.cache.get(&key).await {
            debug!(url = %key, "Fetch cache hit");
            FETCH_ATTEMPTS.with_label_values(&["cached"]).inc();
            return Ok(ScrapingResult {
                source_target: target.source_target.clone(),
                ..hit
            });
        }

        if let Err(wait) = self.limiter.acquire_or_wait_hint().await {
            RATE_LIMIT_REJECTIONS.inc();
            debug!(url = %key, wait_ms = wait.as_millis() as u64, "Rate limiter denied fetch");
            return Err(FetchError::rate_limited(Some(wait)));
        }

        let request = ExtractRequest {
            url: key.clone(),
            page_limit: self.page_limit,
            formats: self.formats.clone(),
        };
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let outcome = self
            .retry
            .execute("fetch", cancel, || async {
                // The first attempt already holds a slot from above.
                if attempts.fetch_add(1, Ordering::SeqCst) > 0 {
                    if let Err(wait) = self.limiter.acquire_or_wait_hint().await {
                        RATE_LIMIT_REJECTIONS.inc();
                        return Err(FetchError::rate_limited(Some(wait)));
                    }
                }
                let response = with_timeout(timeout, self.extractor.extract(&request), || {
                    FetchError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }
                })
                .await?;
                validate(response)
            })
            .await;

        let label = match &outcome {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        FETCH_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        let (content, metadata) = outcome.map_err(|e| {
            warn!(url = %key, error = %e, "Fetch failed");
            e
        })?;

        let result = ScrapingResult {
            url: key.clone(),
            content,
            metadata,
            source_target: target.source_target.clone(),
            fetched_at: Utc::now(),
        };
        self.cache.insert(key, result.clone()).await;
        FETCH_ATTEMPTS.with_label_values(&["success"]).inc();
        Ok(result)
    }
}

/// Turn a collaborator response into content, or the matching error.
fn validate(
    response: ExtractResponse,
) -> Result<(String, serde_json::Map<String, serde_json::Value>), FetchError> {
    if !response.success {
        return Err(FetchError::Upstream {
            message: response
                .error
                .unwrap_or_else(|| "extraction unsuccessful".to_string()),
            transient: false,
        });
    }
    match response.content {
        Some(content) if !content.trim().is_empty() => {
            Ok((content, response.metadata.unwrap_or_default()))
        }
        _ => Err(FetchError::EmptyContent),
    }
}
