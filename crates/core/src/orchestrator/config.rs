//! Research orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::throttle::{RateLimitConfig, RetryConfig};

/// Configuration for research sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Rounds per session before it ends as exhausted.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Cap on accumulated results across the whole session.
    #[serde(default = "default_max_results_total")]
    pub max_results_total: usize,

    /// URLs kept per target after resolution.
    #[serde(default = "default_max_urls_per_target")]
    pub max_urls_per_target: usize,

    /// Concurrent fetches per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches (milliseconds).
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,

    /// Pause between targets within a round (milliseconds).
    #[serde(default = "default_inter_target_delay")]
    pub inter_target_delay_ms: u64,

    /// Deadline for one content extraction call (milliseconds).
    #[serde(default = "default_per_fetch_timeout")]
    pub per_fetch_timeout_ms: u64,

    /// Deadline for one refinement call (milliseconds).
    #[serde(default = "default_refinement_timeout")]
    pub refinement_timeout_ms: u64,

    /// Optional deadline for a whole session (milliseconds).
    /// Expiry behaves like `cancel()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout_ms: Option<u64>,

    /// Default date-range hint appended to searches, e.g. "2024".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_window: Option<String>,

    /// Default domain hint appended to searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_context: Option<String>,

    /// Country-code TLDs recognized as domains in addition to the defaults.
    #[serde(default)]
    pub extra_tlds: Vec<String>,

    /// Sliding-window limit on content extraction calls.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Backoff shared by every collaborator call.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_max_results_total() -> usize {
    50
}

fn default_max_urls_per_target() -> usize {
    5
}

fn default_batch_size() -> usize {
    3
}

fn default_inter_batch_delay() -> u64 {
    1000
}

fn default_inter_target_delay() -> u64 {
    500
}

fn default_per_fetch_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_refinement_timeout() -> u64 {
    60_000 // 60 seconds
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_results_total: default_max_results_total(),
            max_urls_per_target: default_max_urls_per_target(),
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay(),
            inter_target_delay_ms: default_inter_target_delay(),
            per_fetch_timeout_ms: default_per_fetch_timeout(),
            refinement_timeout_ms: default_refinement_timeout(),
            session_timeout_ms: None,
            date_window: None,
            research_context: None,
            extra_tlds: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ResearchConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn inter_target_delay(&self) -> Duration {
        Duration::from_millis(self.inter_target_delay_ms)
    }

    pub fn per_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.per_fetch_timeout_ms)
    }

    pub fn refinement_timeout(&self) -> Duration {
        Duration::from_millis(self.refinement_timeout_ms)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }
}
