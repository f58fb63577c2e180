use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::orchestrator::ResearchConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub extractor: Option<ExtractorConfig>,
    #[serde(default)]
    pub refiner: Option<RefinerConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Search collaborator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Collaborator base URL (e.g., "http://localhost:3001")
    pub url: String,
    /// API key sent as `X-API-KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Organic results requested per search (default: 10)
    #[serde(default = "default_num_results")]
    pub num_results: u32,
    /// Hosts (and their subdomains) ranked after everything else
    #[serde(default = "default_excluded_domains")]
    pub excluded_domains: Vec<String>,
    /// `host[/path-prefix]` patterns never fetched
    #[serde(default = "default_blocked_urls")]
    pub blocked_urls: Vec<String>,
    /// URLs tried when a search succeeds but yields nothing
    #[serde(default)]
    pub fallback_sources: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            timeout_secs: default_timeout(),
            num_results: default_num_results(),
            excluded_domains: default_excluded_domains(),
            blocked_urls: default_blocked_urls(),
            fallback_sources: Vec::new(),
        }
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_num_results() -> u32 {
    10
}

fn default_excluded_domains() -> Vec<String> {
    vec!["google.com".to_string()]
}

fn default_blocked_urls() -> Vec<String> {
    vec![
        "google.com/search".to_string(),
        "google.com/url".to_string(),
    ]
}

/// Content-extraction collaborator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Collaborator base URL (e.g., "http://localhost:3002/v1")
    pub url: String,
    /// API key sent as a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// HTTP client timeout in seconds (default: 60). The per-fetch
    /// deadline in `[research]` usually fires first.
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u32,
    /// Pages followed per URL (default: 1)
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Requested output formats (default: ["markdown"])
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            timeout_secs: default_extractor_timeout(),
            page_limit: default_page_limit(),
            formats: default_formats(),
        }
    }
}

fn default_extractor_timeout() -> u32 {
    60
}

fn default_page_limit() -> u32 {
    1
}

fn default_formats() -> Vec<String> {
    vec!["markdown".to_string()]
}

/// Refinement collaborator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefinerConfig {
    #[serde(default)]
    pub backend: RefinerBackend,
    /// LLM settings (required when backend = "llm")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
    /// Endpoint settings (required when backend = "http")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpRefinerConfig>,
}

/// Available refiner backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefinerBackend {
    #[default]
    Llm,
    Http,
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Anthropic,
    /// Local Ollama instance.
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Model name/identifier.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Maximum tokens for completions.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1024
}

/// External refinement endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRefinerConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u32,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub research: ResearchConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SanitizedSearchConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<SanitizedExtractorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refiner: Option<SanitizedRefinerConfig>,
}

/// Sanitized search config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub num_results: u32,
    pub excluded_domains: Vec<String>,
    pub blocked_urls: Vec<String>,
    pub fallback_sources: Vec<String>,
}

/// Sanitized extractor config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedExtractorConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub page_limit: u32,
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRefinerConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<SanitizedLlmConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<SanitizedHttpRefinerConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedHttpRefinerConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

fn key_configured(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.is_empty())
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            research: config.research.clone(),
            search: config.search.as_ref().map(|s| SanitizedSearchConfig {
                url: s.url.clone(),
                api_key_configured: key_configured(&s.api_key),
                timeout_secs: s.timeout_secs,
                num_results: s.num_results,
                excluded_domains: s.excluded_domains.clone(),
                blocked_urls: s.blocked_urls.clone(),
                fallback_sources: s.fallback_sources.clone(),
            }),
            extractor: config.extractor.as_ref().map(|e| SanitizedExtractorConfig {
                url: e.url.clone(),
                api_key_configured: key_configured(&e.api_key),
                timeout_secs: e.timeout_secs,
                page_limit: e.page_limit,
                formats: e.formats.clone(),
            }),
            refiner: config.refiner.as_ref().map(|r| SanitizedRefinerConfig {
                backend: match r.backend {
                    RefinerBackend::Llm => "llm".to_string(),
                    RefinerBackend::Http => "http".to_string(),
                },
                llm: r.llm.as_ref().map(|l| SanitizedLlmConfig {
                    provider: l.provider.as_str().to_string(),
                    model: l.model.clone(),
                    api_key_configured: key_configured(&l.api_key),
                    api_base: l.api_base.clone(),
                    max_tokens: l.max_tokens,
                }),
                http: r.http.as_ref().map(|h| SanitizedHttpRefinerConfig {
                    url: h.url.clone(),
                    api_key_configured: key_configured(&h.api_key),
                    timeout_secs: h.timeout_secs,
                }),
            }),
        }
    }
}
