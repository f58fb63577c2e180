pub mod config;
pub mod fetcher;
pub mod metrics;
pub mod orchestrator;
pub mod refiner;
pub mod resolver;
pub mod scheduler;
pub mod target;
pub mod testing;
pub mod throttle;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use fetcher::{ContentExtractor, ContentFetcher, FetchCache, FetchError, HttpExtractor, ScrapingResult};
pub use orchestrator::{
    Collaborators, ResearchConfig, ResearchError, ResearchEvent, ResearchOrchestrator,
    ResearchOutcome, ResearchParams, SessionSnapshot, SessionState,
};
pub use refiner::{build_refiner, HttpRefiner, LlmRefiner, RefinementError, Refiner};
pub use resolver::{HttpSearchBackend, ResolutionError, SearchBackend, SearchResolver};
pub use scheduler::BatchScheduler;
pub use target::{normalize_url, ResolvedUrl, SearchTarget, TargetClassifier, TargetKind};
pub use throttle::{RateLimiter, RetryPolicy, Retryable};
