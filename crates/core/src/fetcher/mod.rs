//! Content fetching.
//!
//! `ContentExtractor` abstracts the external extraction collaborator;
//! `ContentFetcher` wraps it with URL validation, the session cache, the
//! session rate limiter and the shared retry policy.

mod cache;
mod content;
mod http;
mod types;

pub use cache::FetchCache;
pub use content::ContentFetcher;
pub use http::HttpExtractor;
pub use types::*;
