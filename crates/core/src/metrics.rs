//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Content fetching (attempts, cache hits, rate limiting, latency)
//! - Search resolution and refinement calls
//! - Retry behaviour across all collaborator call sites
//! - Research sessions (rounds, terminal states)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Fetching
// =============================================================================

/// Fetch attempts by result.
pub static FETCH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("delver_fetch_attempts_total", "Total content fetch attempts"),
        // "success", "cached", "invalid", "rate_limited", "timeout", "upstream_error", "empty_content"
        &["result"],
    )
    .unwrap()
});

/// Fetch duration in seconds (network fetches only).
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "delver_fetch_duration_seconds",
            "Duration of content extraction calls",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Requests rejected by a rate limiter before reaching the network.
pub static RATE_LIMIT_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "delver_rate_limit_rejections_total",
        "Calls denied by the sliding-window rate limiter",
    )
    .unwrap()
});

// =============================================================================
// Collaborators
// =============================================================================

/// Search collaborator requests by result.
pub static SEARCH_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "delver_search_requests_total",
            "Total search resolution requests",
        ),
        &["result"], // "success", "empty", "error", "fallback"
    )
    .unwrap()
});

/// Refinement collaborator requests by result.
pub static REFINEMENT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "delver_refinement_requests_total",
            "Total refinement requests",
        ),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Retries performed, by operation.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("delver_retry_attempts_total", "Retries of failed operations"),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Sessions
// =============================================================================

/// Research rounds started.
pub static ROUNDS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("delver_rounds_started_total", "Total research rounds started").unwrap()
});

/// Results accumulated per round.
pub static ROUND_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "delver_round_results",
            "Number of fetched results per research round",
        )
        .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

/// Sessions that reached a terminal state, by state.
pub static SESSIONS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "delver_sessions_finished_total",
            "Research sessions that reached a terminal state",
        ),
        &["state"], // "done", "exhausted", "canceled", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FETCH_ATTEMPTS.clone()),
        Box::new(FETCH_DURATION.clone()),
        Box::new(RATE_LIMIT_REJECTIONS.clone()),
        Box::new(SEARCH_REQUESTS.clone()),
        Box::new(REFINEMENT_REQUESTS.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(ROUNDS_STARTED.clone()),
        Box::new(ROUND_RESULTS.clone()),
        Box::new(SESSIONS_FINISHED.clone()),
    ]
}
