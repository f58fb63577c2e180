//! URL normalization and host rules.

use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameters that only carry tracking state.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "mc_cid", "mc_eid"];

/// A concrete, normalized URL derived from a search target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedUrl {
    /// Normalized absolute URL.
    pub url: String,
    /// The target string this URL was resolved from.
    pub source_target: String,
}

impl ResolvedUrl {
    pub fn new(url: impl Into<String>, source_target: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source_target: source_target.into(),
        }
    }
}

/// Normalize a URL (or bare domain) into the form used for cache and dedup keys.
///
/// Returns `None` for anything that is not an http(s) URL with a host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return None;
    }

    let lower = raw.to_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else if lower.contains("://") {
        return None;
    } else {
        format!("https://{}", raw)
    };

    let mut url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }
    let host = url.host_str()?;
    if !host.contains('.') && host != "localhost" {
        return None;
    }

    url.set_fragment(None);

    if let Some(query) = url.query().map(str::to_string) {
        let segments: Vec<&str> = query.split('&').collect();
        let kept: Vec<&str> = segments
            .iter()
            .copied()
            .filter(|segment| !is_tracking_param(&segment_key(segment)))
            .collect();
        // Untouched unless something was dropped.
        if kept.len() != segments.len() {
            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.set_query(Some(&kept.join("&")));
            }
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

fn segment_key(segment: &str) -> String {
    let raw = segment.split('=').next().unwrap_or_default();
    urlencoding::decode(raw)
        .map(|key| key.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Lowercased host of a URL, if it parses.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Whether `host` is one of `domains` or a subdomain of one.
pub fn is_excluded_host(host: &str, domains: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_lowercase();
    domains.iter().any(|d| {
        let d = d.trim().trim_start_matches('.').to_lowercase();
        !d.is_empty() && (host == d || host.ends_with(&format!(".{}", d)))
    })
}

/// A disallowed URL pattern: a host (matching subdomains too) and an
/// optional path prefix, written as `google.com/search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRule {
    host: String,
    path_prefix: Option<String>,
}

impl BlockRule {
    /// Parse a rule from its `host[/path]` form.
    pub fn parse(rule: &str) -> Option<Self> {
        let rule = rule
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        if rule.is_empty() {
            return None;
        }
        let (host, path) = match rule.find('/') {
            Some(idx) => (&rule[..idx], Some(rule[idx..].to_string())),
            None => (rule, None),
        };
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_lowercase(),
            path_prefix: path.filter(|p| p != "/"),
        })
    }

    /// Parse every valid rule in `rules`, skipping malformed ones.
    pub fn parse_all(rules: &[String]) -> Vec<Self> {
        rules.iter().filter_map(|r| Self::parse(r)).collect()
    }

    /// Whether the (already parsed) URL matches this rule.
    pub fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        if !is_excluded_host(host, std::slice::from_ref(&self.host)) {
            return false;
        }
        match &self.path_prefix {
            Some(prefix) => parsed.path().starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// Whether any rule blocks `url`.
pub fn is_blocked(url: &str, rules: &[BlockRule]) -> bool {
    rules.iter().any(|r| r.matches(url))
}
