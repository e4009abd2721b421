//! Structured-output LLM backends.
//!
//! The planner only needs one capability: "given instructions, free text and
//! a JSON schema, return a JSON value shaped like the schema". Two backends
//! provide it over HTTP:
//! - `OpenAiClient`: OpenAI-compatible `/chat/completions`, forcing a
//!   function call whose parameters are the schema.
//! - `OllamaClient`: Ollama `/api/chat` with `format` set to the schema.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Secret;

/// Errors from a structured-output call.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend returned no content")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        InferenceError::Request(e.to_string())
    }
}

/// One structured-output request.
#[derive(Debug, Clone, Copy)]
pub struct StructuredRequest<'a> {
    /// Fixed instructions (system prompt).
    pub system: &'a str,
    /// User text.
    pub user: &'a str,
    /// Schema name, used as the function name for OpenAI.
    pub schema_name: &'a str,
    /// JSON schema the output must follow.
    pub schema: &'a serde_json::Value,
}

/// Trait for backends that turn text into schema-shaped JSON.
#[async_trait]
pub trait StructuredOutput: Send + Sync {
    /// Run one request. Exactly one attempt, no retry.
    async fn generate(
        &self,
        request: StructuredRequest<'_>,
    ) -> Result<serde_json::Value, InferenceError>;

    /// Backend name (for logging).
    fn backend_name(&self) -> &str;
}

/// Which HTTP API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    OpenAi,
    Ollama,
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown LLM backend '{other}' (expected openai or ollama)")),
        }
    }
}

/// LLM settings (`[llm]` table).
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: LlmBackend,
    /// Model name. Defaults per backend.
    #[serde(default)]
    pub model: Option<String>,
    /// API base URL. Defaults per backend.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token for OpenAI-compatible APIs.
    #[serde(default)]
    pub api_key: Option<Secret>,
    #[serde(default)]
    pub temperature: f32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        match (&self.model, self.backend) {
            (Some(model), _) => model,
            (None, LlmBackend::OpenAi) => "gpt-3.5-turbo",
            (None, LlmBackend::Ollama) => "llama3.1:8b",
        }
    }

    pub fn base_url(&self) -> &str {
        let url = match (&self.base_url, self.backend) {
            (Some(url), _) => url.as_str(),
            (None, LlmBackend::OpenAi) => "https://api.openai.com/v1",
            (None, LlmBackend::Ollama) => "http://localhost:11434",
        };
        url.trim_end_matches('/')
    }
}

/// Build the configured backend.
pub fn build_backend(config: &LlmConfig) -> Result<Arc<dyn StructuredOutput>, InferenceError> {
    let backend: Arc<dyn StructuredOutput> = match config.backend {
        LlmBackend::OpenAi => Arc::new(OpenAiClient::new(config.clone())?),
        LlmBackend::Ollama => Arc::new(OllamaClient::new(config.clone())?),
    };
    tracing::info!(
        backend = backend.backend_name(),
        model = config.model(),
        url = config.base_url(),
        "LLM backend configured"
    );
    Ok(backend)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, InferenceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InferenceError::Request(format!("failed to build HTTP client: {e}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InferenceError::Status {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

/// Extract JSON from LLM output that may be wrapped in markdown code blocks.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    trimmed
}

fn parse_model_json(text: &str) -> Result<serde_json::Value, InferenceError> {
    let json = extract_json(text);
    if json.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    serde_json::from_str(json)
        .map_err(|e| InferenceError::InvalidJson(format!("{e} (raw: {text})")))
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn messages<'a>(request: &StructuredRequest<'a>) -> Vec<ChatMessage<'a>> {
    vec![
        ChatMessage {
            role: "system",
            content: request.system,
        },
        ChatMessage {
            role: "user",
            content: request.user,
        },
    ]
}

// ── OpenAI-compatible ───────────────────────────────────────────

/// Chat completions request body.
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    tools: Vec<serde_json::Value>,
    tool_choice: serde_json::Value,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    arguments: String,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, InferenceError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config,
        })
    }
}

#[async_trait]
impl StructuredOutput for OpenAiClient {
    async fn generate(
        &self,
        request: StructuredRequest<'_>,
    ) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/chat/completions", self.config.base_url());
        let body = CompletionRequest {
            model: self.config.model(),
            messages: messages(&request),
            temperature: self.config.temperature,
            tools: vec![serde_json::json!({
                "type": "function",
                "function": {
                    "name": request.schema_name,
                    "description": "Return the generated commands.",
                    "parameters": request.schema,
                }
            })],
            tool_choice: serde_json::json!({
                "type": "function",
                "function": { "name": request.schema_name }
            }),
        };

        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key.expose());
        }

        let response = check_status(http.send().await?).await?;
        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidJson(format!("completion body: {e}")))?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .ok_or(InferenceError::EmptyResponse)?
            .message;

        // Forced tool call first; some compatible servers answer in content.
        if let Some(call) = message.tool_calls.into_iter().next() {
            return parse_model_json(&call.function.arguments);
        }
        match message.content {
            Some(content) => parse_model_json(&content),
            None => Err(InferenceError::EmptyResponse),
        }
    }

    fn backend_name(&self) -> &str {
        "openai"
    }
}

// ── Ollama ──────────────────────────────────────────────────────

/// Ollama chat API request body.
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a serde_json::Value,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response (only fields we need).
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self, InferenceError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config,
        })
    }
}

#[async_trait]
impl StructuredOutput for OllamaClient {
    async fn generate(
        &self,
        request: StructuredRequest<'_>,
    ) -> Result<serde_json::Value, InferenceError> {
        let url = format!("{}/api/chat", self.config.base_url());
        let body = OllamaChatRequest {
            model: self.config.model(),
            messages: messages(&request),
            format: request.schema,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = check_status(self.client.post(&url).json(&body).send().await?).await?;
        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidJson(format!("ollama body: {e}")))?;

        let content = chat.message.ok_or(InferenceError::EmptyResponse)?.content;
        parse_model_json(&content)
    }

    fn backend_name(&self) -> &str {
        "ollama"
    }
}
