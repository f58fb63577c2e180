//! LLM client abstraction and implementations.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider};

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Not configured")]
    NotConfigured,
}

/// Tokens spent on one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One prompt sent to a model. Sampling is always greedy.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// Model that actually answered, as reported by the provider.
    pub model: String,
}

/// A chat-style model endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Run a completion and parse the answer as JSON.
///
/// Markdown fences and chatter around the object are tolerated.
pub async fn complete_json<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: CompletionRequest,
) -> Result<(T, TokenUsage), LlmError> {
    let response = client.complete(request).await?;
    let parsed = parse_json_answer(&response.text)?;
    Ok((parsed, response.usage))
}

/// Parse a JSON object out of free-form model output.
pub fn parse_json_answer<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let body = strip_code_fences(text);
    if let Ok(parsed) = serde_json::from_str(body) {
        return Ok(parsed);
    }
    let slice = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };
    serde_json::from_str(slice).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        LlmError::Json(format!("{}: {}", e, preview))
    })
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Opening fence may carry a language tag.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

/// Build a client for the configured provider.
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Anthropic => {
            let api_key = config
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::NotConfigured)?;
            Arc::new(
                AnthropicClient::new(api_key, &config.model)
                    .with_api_base_opt(config.api_base.as_deref()),
            )
        }
        LlmProvider::Ollama => Arc::new(
            OllamaClient::new(&config.model).with_api_base_opt(config.api_base.as_deref()),
        ),
    };
    Ok(client)
}

/// Message shape shared by both chat APIs.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: String) -> Self {
        Self {
            role: "system",
            content,
        }
    }

    fn user(content: String) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

/// POST `body` and decode a success payload, or turn the error body into
/// `LlmError::Api` using `message` to pick the provider's error text.
async fn post_json<B, R, E, F>(
    request: reqwest::RequestBuilder,
    body: &B,
    message: F,
) -> Result<R, LlmError>
where
    B: Serialize,
    R: DeserializeOwned,
    E: DeserializeOwned,
    F: FnOnce(E) -> String,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<E>(&raw).map(message).unwrap_or(raw);
        return Err(LlmError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::Json(e.to_string()))
}

// ============================================================================
// Anthropic
// ============================================================================

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            api_base: ANTHROPIC_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn with_api_base_opt(self, api_base: Option<&str>) -> Self {
        match api_base {
            Some(base) => self.with_api_base(base),
            None => self,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: [ChatMessage; 1],
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    model: String,
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesError {
    error: MessagesErrorDetail,
}

#[derive(Debug, Deserialize)]
struct MessagesErrorDetail {
    message: String,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = MessagesBody {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            temperature: 0.0,
            system: request.system,
            messages: [ChatMessage::user(request.prompt)],
        };

        let builder = self
            .http
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let reply: MessagesReply =
            post_json(builder, &body, |e: MessagesError| e.error.message).await?;

        let text = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<String>();

        Ok(CompletionResponse {
            text,
            usage: TokenUsage {
                input_tokens: reply.usage.input_tokens,
                output_tokens: reply.usage.output_tokens,
            },
            model: reply.model,
        })
    }
}

// ============================================================================
// Ollama
// ============================================================================

const OLLAMA_API_BASE: &str = "http://localhost:11434";

/// Ollama chat client for local inference.
pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    api_base: String,
}

impl OllamaClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            model: model.into(),
            api_base: OLLAMA_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn with_api_base_opt(self, api_base: Option<&str>) -> Self {
        match api_base {
            Some(base) => self.with_api_base(base),
            None => self,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatBody {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Constrains output to valid JSON.
    format: &'static str,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    model: String,
    message: ChatReplyMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    error: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut messages = Vec::with_capacity(2);
        messages.extend(request.system.map(ChatMessage::system));
        messages.push(ChatMessage::user(request.prompt));

        let body = ChatBody {
            model: self.model.clone(),
            messages,
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: 0.0,
                num_predict: request.max_tokens,
            },
        };

        let builder = self.http.post(format!("{}/api/chat", self.api_base));
        let reply: ChatReply = post_json(builder, &body, |e: ChatError| e.error).await?;

        Ok(CompletionResponse {
            text: reply.message.content,
            usage: TokenUsage {
                input_tokens: reply.prompt_eval_count,
                output_tokens: reply.eval_count,
            },
            model: reply.model,
        })
    }
}
