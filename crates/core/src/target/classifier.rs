//! Target classification.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Top-level domains recognized out of the box.
pub const DEFAULT_TLDS: &[&str] = &[".com", ".org", ".net", ".edu", ".gov"];

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,})")
        .expect("domain regex is valid")
});

/// What kind of thing a search target string denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// `http://` or `https://` URL, fetched as-is.
    DirectUrl,
    /// Bare domain such as `example.com`, fetched as its home page.
    Domain,
    /// `site:` query, resolved through search.
    SiteQuery,
    /// Anything else, resolved through search.
    FreeText,
}

impl TargetKind {
    /// Whether targets of this kind go through the search collaborator.
    pub fn needs_search(&self) -> bool {
        matches!(self, TargetKind::SiteQuery | TargetKind::FreeText)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::DirectUrl => "direct_url",
            TargetKind::Domain => "domain",
            TargetKind::SiteQuery => "site_query",
            TargetKind::FreeText => "free_text",
        }
    }
}

/// A classified search target. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTarget {
    /// The target string as given (trimmed).
    pub text: String,
    pub kind: TargetKind,
}

/// Pure, total classifier for search target strings.
///
/// Rules are applied in order:
/// 1. `http://` / `https://` prefix -> `DirectUrl`
/// 2. `site:` prefix -> `SiteQuery`
/// 3. recognized TLD substring and no whitespace -> `Domain`
/// 4. otherwise -> `FreeText`
#[derive(Debug, Clone)]
pub struct TargetClassifier {
    tlds: Vec<String>,
}

impl Default for TargetClassifier {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl TargetClassifier {
    /// Create a classifier recognizing the default TLDs plus `extra_tlds`
    /// (country codes such as `uk` or `.de`; the leading dot is optional).
    pub fn new(extra_tlds: &[String]) -> Self {
        let mut tlds: Vec<String> = DEFAULT_TLDS.iter().map(|t| t.to_string()).collect();
        for tld in extra_tlds {
            let tld = tld.trim().to_lowercase();
            if tld.is_empty() {
                continue;
            }
            let tld = if tld.starts_with('.') {
                tld
            } else {
                format!(".{}", tld)
            };
            if !tlds.contains(&tld) {
                tlds.push(tld);
            }
        }
        Self { tlds }
    }

    /// The TLD substrings this classifier recognizes.
    pub fn tlds(&self) -> &[String] {
        &self.tlds
    }

    /// Classify a target string.
    pub fn classify(&self, s: &str) -> TargetKind {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            return TargetKind::DirectUrl;
        }
        if lower.starts_with("site:") {
            return TargetKind::SiteQuery;
        }
        // Whitespace is the tie-break: "Acme Corp. events" stays free text.
        if !lower.chars().any(char::is_whitespace)
            && self.tlds.iter().any(|tld| lower.contains(tld.as_str()))
        {
            return TargetKind::Domain;
        }
        TargetKind::FreeText
    }

    /// Classify and wrap a target string.
    pub fn target(&self, s: &str) -> SearchTarget {
        SearchTarget {
            text: s.trim().to_string(),
            kind: self.classify(s),
        }
    }
}

/// Extract the literal domain out of a target string.
///
/// Handles `site:example.com foo`, `https://example.com/path`, bare
/// `example.com` and free text that mentions a domain. Returns the
/// lowercased host without a `www.` prefix.
pub fn extract_domain(s: &str) -> Option<String> {
    let trimmed = s.trim();
    let rest = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("site:") => &trimmed[5..],
        _ => trimmed,
    };
    let rest = rest
        .trim_start()
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    let found = DOMAIN_RE.find(rest)?;
    let domain = found.as_str().to_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain).to_string();
    Some(domain)
}
