use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sofra_core::config::{LlmConfig, LlmProvider};
use thiserror::Error;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completions are short structured-JSON extractions, so the cap stays low.
const MAX_COMPLETION_TOKENS: u32 = 1024;

/// Characters of a provider error body kept in error messages.
const ERROR_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm client configuration: {0}")]
    Config(String),
    #[error("llm transport failure: {0}")]
    Request(String),
    #[error("llm returned an unusable response: {0}")]
    Response(String),
    #[error("llm provider rejected the request as over quota")]
    RateLimited,
    #[error("llm call exceeded {0:?}")]
    Timeout(Duration),
}

/// One extraction call: a fixed system instruction plus the rendered
/// per-turn context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Model identifier for log lines.
    fn model(&self) -> &str;
}

/// Builds the provider client the configuration names. The returned client
/// carries its own hard request timeout.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        LlmProvider::OpenAi => {
            let api_key = require_api_key(config, "openai")?;
            let base_url = config.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string());
            Ok(Arc::new(OpenAiCompatibleClient::new(
                base_url,
                Some(api_key),
                config.model.clone(),
                timeout,
            )?))
        }
        LlmProvider::Ollama => {
            let base_url = config.base_url.clone().unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
            Ok(Arc::new(OpenAiCompatibleClient::new(
                base_url,
                None,
                config.model.clone(),
                timeout,
            )?))
        }
        LlmProvider::Anthropic => {
            let api_key = require_api_key(config, "anthropic")?;
            let base_url =
                config.base_url.clone().unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string());
            Ok(Arc::new(AnthropicClient::new(base_url, api_key, config.model.clone(), timeout)?))
        }
    }
}

fn require_api_key(config: &LlmConfig, provider: &str) -> Result<SecretString, LlmError> {
    config
        .api_key
        .clone()
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or_else(|| LlmError::Config(format!("llm.api_key is required for the {provider} provider")))
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| LlmError::Config(format!("http client build failed: {err}")))
}

fn transport_error(timeout: Duration, err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Request(err.to_string())
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(ERROR_SNIPPET_CHARS).collect()
}

/// Chat-completions client covering OpenAI and Ollama, which share the
/// `/v1/chat/completions` wire shape. Ollama runs without an API key.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: String,
        api_key: Option<SecretString>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            // Extraction wants the most literal reading, not variety.
            temperature: 0.0,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, "sending chat completion request");

        let mut builder = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response =
            builder.send().await.map_err(|err| transport_error(self.timeout, err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::Response(format!("provider returned {status}: {}", snippet(&body))));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Response(format!("completion decode failed: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::Response("completion carried no content".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Anthropic Messages API client (`/v1/messages`).
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_COMPLETION_TOKENS,
            system: &request.system,
            messages: vec![ChatMessage { role: "user", content: &request.user }],
        };

        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(model = %self.model, "sending messages request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(self.timeout, err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::Response(format!("provider returned {status}: {}", snippet(&body))));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Response(format!("completion decode failed: {err}")))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::Response("completion carried no text blocks".to_string()));
        }
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Plays back queued replies in order and records every request it saw.
/// The double the gateway and engine tests drive conversations with.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn fail(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, outcome: Result<String, LlmError>) {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).push_back(outcome);
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Response("scripted replies exhausted".to_string())))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
