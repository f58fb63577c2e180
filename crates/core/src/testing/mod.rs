//! Testing utilities and mock implementations of the collaborator traits.
//!
//! The mocks let the resolver, fetcher and orchestrator be exercised end to
//! end without a search engine, extraction service or LLM.
//!
//! # Example
//!
//! ```rust,ignore
//! use delver_core::testing::{MockExtractor, MockRefiner, MockSearchBackend};
//!
//! let search = MockSearchBackend::new();
//! let extractor = MockExtractor::new();
//! let refiner = MockRefiner::new();
//!
//! search.set_response(SearchResponse::from_links(["https://a.com/"])).await;
//! extractor.set_content("https://a.com/", "alpha").await;
//! refiner.push_targets(&["follow-up query"]).await;
//! ```

mod mock_extractor;
mod mock_refiner;
mod mock_search_backend;

pub use mock_extractor::MockExtractor;
pub use mock_refiner::MockRefiner;
pub use mock_search_backend::{MockSearchBackend, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::orchestrator::{ResearchConfig, ResearchParams};
    use crate::throttle::{RateLimitConfig, RetryConfig};

    /// Research config with every delay zeroed and retries kept short.
    pub fn fast_research_config() -> ResearchConfig {
        ResearchConfig {
            inter_batch_delay_ms: 0,
            inter_target_delay_ms: 0,
            per_fetch_timeout_ms: 2_000,
            refinement_timeout_ms: 2_000,
            rate_limit: RateLimitConfig {
                window_ms: 60_000,
                max_calls_per_window: 1_000,
            },
            retry: RetryConfig {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            ..ResearchConfig::default()
        }
    }

    /// Research parameters for `targets` with a single goal.
    pub fn research_params(targets: &[&str]) -> ResearchParams {
        ResearchParams {
            search_targets: targets.iter().map(|t| t.to_string()).collect(),
            research_goals: vec!["Understand the topic".to_string()],
            ..ResearchParams::default()
        }
    }
}
