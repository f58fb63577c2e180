//! Search resolution.
//!
//! This module provides a `SearchBackend` trait for the external search
//! collaborator and the `SearchResolver` that turns its answers into ranked,
//! deduplicated URLs with fallback handling for structured targets.

mod http;
mod resolve;
mod types;

pub use http::HttpSearchBackend;
pub use resolve::{enrich_query, SearchResolver};
pub use types::*;
