//! Search-to-URL resolution.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::metrics::SEARCH_REQUESTS;
use crate::target::{
    extract_domain, host_of, is_blocked, is_excluded_host, normalize_url, BlockRule, ResolvedUrl,
    SearchTarget, TargetKind,
};
use crate::throttle::{with_timeout, RetryPolicy};

use super::{ResolutionError, ResolveOptions, SearchBackend, SearchRequest, SearchResponse};

/// Default number of organic results requested from the collaborator.
const DEFAULT_NUM_RESULTS: u32 = 10;

/// Append `context` and `date_window` to `query` unless already present.
pub fn enrich_query(query: &str, date_window: Option<&str>, context: Option<&str>) -> String {
    let mut enriched = query.trim().to_string();
    for extra in [context, date_window].into_iter().flatten() {
        let extra = extra.trim();
        if extra.is_empty() {
            continue;
        }
        if !enriched.to_lowercase().contains(&extra.to_lowercase()) {
            enriched.push(' ');
            enriched.push_str(extra);
        }
    }
    enriched
}

/// Turns search queries into ranked, deduplicated URLs.
pub struct SearchResolver {
    backend: Arc<dyn SearchBackend>,
    excluded_domains: Vec<String>,
    block_rules: Vec<BlockRule>,
    fallback_sources: Vec<String>,
    num_results: u32,
    retry: RetryPolicy,
    timeout: Duration,
}

impl SearchResolver {
    /// Create a resolver with no exclusions, no fallbacks and no retries.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            excluded_domains: Vec::new(),
            block_rules: Vec::new(),
            fallback_sources: Vec::new(),
            num_results: DEFAULT_NUM_RESULTS,
            retry: RetryPolicy::none(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a resolver using the host rules and limits from `config`.
    pub fn from_config(
        backend: Arc<dyn SearchBackend>,
        config: &SearchConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self::new(backend)
            .with_excluded_domains(config.excluded_domains.clone())
            .with_block_rules(BlockRule::parse_all(&config.blocked_urls))
            .with_fallback_sources(config.fallback_sources.clone())
            .with_num_results(config.num_results)
            .with_timeout(Duration::from_secs(config.timeout_secs as u64))
            .with_retry(retry)
    }

    /// Hosts deprioritized in the first selection pass.
    pub fn with_excluded_domains(mut self, domains: Vec<String>) -> Self {
        self.excluded_domains = domains;
        self
    }

    /// URLs never returned.
    pub fn with_block_rules(mut self, rules: Vec<BlockRule>) -> Self {
        self.block_rules = rules;
        self
    }

    /// URLs to try when a search succeeds but yields nothing.
    pub fn with_fallback_sources(mut self, sources: Vec<String>) -> Self {
        self.fallback_sources = sources;
        self
    }

    pub fn with_num_results(mut self, num_results: u32) -> Self {
        self.num_results = num_results;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn block_rules(&self) -> &[BlockRule] {
        &self.block_rules
    }

    /// Resolve `query` into at most `opts.limit` URLs tagged with `query`.
    ///
    /// An upstream success with nothing usable is `Ok(vec![])`.
    pub async fn resolve(
        &self,
        query: &str,
        opts: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedUrl>, ResolutionError> {
        if opts.limit == 0 {
            return Ok(Vec::new());
        }

        let request = SearchRequest {
            query: enrich_query(query, opts.date_window.as_deref(), opts.context.as_deref()),
            num_results: self.num_results.max(opts.limit as u32),
        };
        debug!(
            backend = self.backend.name(),
            query = %request.query,
            "Resolving search query"
        );

        let result = self
            .retry
            .execute("search", cancel, || {
                with_timeout(self.timeout, self.backend.search(&request), || {
                    ResolutionError::Timeout(self.timeout)
                })
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                SEARCH_REQUESTS.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        let urls = self.select(query, response, opts.limit);
        let label = if urls.is_empty() { "empty" } else { "success" };
        SEARCH_REQUESTS.with_label_values(&[label]).inc();
        Ok(urls)
    }

    /// Resolve a classified target, applying the fallback policy.
    ///
    /// Direct URLs and domains resolve to themselves without a search. A
    /// failed `site:` search falls back to the literal domain. A search that
    /// succeeds with nothing falls back to the configured fallback sources.
    pub async fn resolve_target(
        &self,
        target: &SearchTarget,
        opts: &ResolveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedUrl>, ResolutionError> {
        match target.kind {
            TargetKind::DirectUrl | TargetKind::Domain => Ok(normalize_url(&target.text)
                .filter(|url| !is_blocked(url, &self.block_rules))
                .map(|url| vec![ResolvedUrl::new(url, target.text.clone())])
                .unwrap_or_default()),
            TargetKind::SiteQuery | TargetKind::FreeText => {
                match self.resolve(&target.text, opts, cancel).await {
                    Ok(urls) if urls.is_empty() => {
                        let fallback = self.fallback_urls(&target.text, opts.limit);
                        if !fallback.is_empty() {
                            info!(
                                search_target = %target.text,
                                count = fallback.len(),
                                "Search empty, using fallback sources"
                            );
                            SEARCH_REQUESTS.with_label_values(&["fallback"]).inc();
                        }
                        Ok(fallback)
                    }
                    Ok(urls) => Ok(urls),
                    Err(e) if target.kind == TargetKind::SiteQuery => {
                        match extract_domain(&target.text).and_then(|d| normalize_url(&d)) {
                            Some(url) => {
                                warn!(
                                    search_target = %target.text,
                                    error = %e,
                                    url = %url,
                                    "Search failed, falling back to literal domain"
                                );
                                SEARCH_REQUESTS.with_label_values(&["fallback"]).inc();
                                Ok(vec![ResolvedUrl::new(url, target.text.clone())])
                            }
                            None => Err(e),
                        }
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Configured fallback sources, normalized and tagged with `source_target`.
    pub fn fallback_urls(&self, source_target: &str, limit: usize) -> Vec<ResolvedUrl> {
        let mut seen = HashSet::new();
        self.fallback_sources
            .iter()
            .filter_map(|s| normalize_url(s))
            .filter(|url| !is_blocked(url, &self.block_rules))
            .filter(|url| seen.insert(url.clone()))
            .take(limit)
            .map(|url| ResolvedUrl::new(url, source_target))
            .collect()
    }

    /// Rank and dedup the collaborator's answer.
    ///
    /// The knowledge-panel website goes first. Then non-excluded hosts in
    /// original order, then any remaining non-blocked URLs if there is room.
    fn select(&self, source_target: &str, response: SearchResponse, limit: usize) -> Vec<ResolvedUrl> {
        let links: Vec<String> = response
            .organic_results
            .iter()
            .filter_map(|r| normalize_url(&r.link))
            .filter(|url| !is_blocked(url, &self.block_rules))
            .collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut picked: Vec<String> = Vec::new();

        if let Some(website) = response
            .knowledge_graph_website
            .as_deref()
            .and_then(normalize_url)
            .filter(|url| !is_blocked(url, &self.block_rules))
        {
            seen.insert(website.clone());
            picked.push(website);
        }

        for url in &links {
            if picked.len() >= limit {
                break;
            }
            let excluded = host_of(url)
                .map(|h| is_excluded_host(&h, &self.excluded_domains))
                .unwrap_or(true);
            if !excluded && seen.insert(url.clone()) {
                picked.push(url.clone());
            }
        }

        for url in &links {
            if picked.len() >= limit {
                break;
            }
            if seen.insert(url.clone()) {
                picked.push(url.clone());
            }
        }

        picked.truncate(limit);
        picked
            .into_iter()
            .map(|url| ResolvedUrl::new(url, source_target))
            .collect()
    }
}
