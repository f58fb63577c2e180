//! Refinement collaborator.
//!
//! The `Refiner` trait reviews a finished round and proposes the next
//! round's targets. It also turns a research question into the first
//! round's targets. Two implementations exist:
//! - `LlmRefiner`: prompts an LLM (Anthropic or Ollama) directly
//! - `HttpRefiner`: delegates to an external JSON service

mod http;
pub mod llm;
mod llm_refiner;
mod types;

use std::sync::Arc;

use crate::config::{RefinerBackend, RefinerConfig};

pub use http::HttpRefiner;
pub use llm::{AnthropicClient, LlmClient, LlmError, OllamaClient};
pub use llm_refiner::LlmRefiner;
pub use types::*;

/// Build the refiner selected by `config`.
pub fn build_refiner(config: &RefinerConfig) -> Result<Arc<dyn Refiner>, RefinementError> {
    match config.backend {
        RefinerBackend::Llm => {
            let llm_config = config.llm.as_ref().ok_or(RefinementError::NotConfigured)?;
            let client = llm::create_llm_client(llm_config)?;
            Ok(Arc::new(
                LlmRefiner::new(client).with_max_tokens(llm_config.max_tokens),
            ))
        }
        RefinerBackend::Http => {
            let http_config = config.http.as_ref().ok_or(RefinementError::NotConfigured)?;
            Ok(Arc::new(HttpRefiner::new(http_config)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpRefinerConfig, LlmConfig, LlmProvider};

    #[test]
    fn test_build_refiner_requires_section() {
        let config = RefinerConfig {
            backend: RefinerBackend::Http,
            llm: None,
            http: None,
        };
        assert!(matches!(
            build_refiner(&config),
            Err(RefinementError::NotConfigured)
        ));
    }

    #[test]
    fn test_build_refiner_variants() {
        let http = RefinerConfig {
            backend: RefinerBackend::Http,
            llm: None,
            http: Some(HttpRefinerConfig {
                url: "http://localhost:4000".into(),
                api_key: None,
                timeout_secs: 30,
            }),
        };
        assert_eq!(build_refiner(&http).unwrap().name(), "http");

        let llm = RefinerConfig {
            backend: RefinerBackend::Llm,
            llm: Some(LlmConfig {
                provider: LlmProvider::Ollama,
                model: "llama3".into(),
                api_key: None,
                api_base: None,
                max_tokens: 512,
            }),
            http: None,
        };
        assert_eq!(build_refiner(&llm).unwrap().name(), "llm");

        let missing_key = RefinerConfig {
            backend: RefinerBackend::Llm,
            llm: Some(LlmConfig {
                provider: LlmProvider::Anthropic,
                model: "claude-3-5-haiku-latest".into(),
                api_key: None,
                api_base: None,
                max_tokens: 512,
            }),
            http: None,
        };
        assert!(matches!(
            build_refiner(&missing_key),
            Err(RefinementError::Llm(LlmError::NotConfigured))
        ));
    }
}
