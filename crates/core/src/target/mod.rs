//! Search targets: classification and URL handling.
//!
//! A search target is whatever the research loop was asked to look at: a
//! full URL, a bare domain, a `site:`-scoped query or plain text. This module
//! decides which one a string is (without touching the network) and provides
//! the URL normalization every other component keys on.

mod classifier;
mod normalize;

pub use classifier::{extract_domain, SearchTarget, TargetClassifier, TargetKind, DEFAULT_TLDS};
pub use normalize::{host_of, is_blocked, is_excluded_host, normalize_url, BlockRule, ResolvedUrl};
