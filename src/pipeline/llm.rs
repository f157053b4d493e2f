//! Completion clients: turn a prompt into the model's raw text.
//!
//! The driver only ever sees [`CompletionClient`]. Two implementations ship
//! with the crate:
//!
//! - [`OllamaClient`] — the default. Non-streaming `POST /api/generate` on a
//!   local Ollama server.
//! - [`ProviderClient`] — any edgequake-llm [`LLMProvider`] (OpenAI,
//!   Anthropic, Gemini, …), selected with `provider_name`.
//!
//! ## No retries
//!
//! A refused connection or a timed-out completion is returned as-is and ends
//! the job. A local backend that is down or saturated does not recover
//! between two pages, and a retry loop would only multiply a 180 s wait.

use crate::config::AnnotatorConfig;
use crate::error::{AnnotatorError, CompletionError};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Anything that can complete a prompt.
///
/// Implementations must not panic and must keep connection failures and
/// timeouts distinguishable from other errors.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CompletionError>>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String {
        "completion client".to_string()
    }
}

/// Pick the client for `config`: an explicit client, then an explicit
/// provider, then `provider_name` (`None`/`"ollama"` → Ollama).
pub fn resolve_client(config: &AnnotatorConfig) -> Result<Arc<dyn CompletionClient>, AnnotatorError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderClient::new(
            Arc::clone(provider),
            config.provider_name.as_deref().unwrap_or("custom"),
            config,
        )));
    }

    match config.provider_name.as_deref() {
        None | Some("ollama") => Ok(Arc::new(OllamaClient::from_config(config)?)),
        Some(name) => {
            let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
                AnnotatorError::ProviderNotConfigured {
                    provider: name.to_string(),
                    hint: format!("{e}"),
                }
            })?;
            Ok(Arc::new(ProviderClient::new(provider, name, config)))
        }
    }
}

// ── Ollama ───────────────────────────────────────────────────────────────

/// Client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    host: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
    health_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self, AnnotatorError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AnnotatorError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            host: config.ollama_host.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
            health_timeout_secs: config.health_timeout_secs,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Health check: list installed models via `GET /api/tags`.
    ///
    /// Uses the short health timeout, so an offline server is reported quickly.
    pub async fn probe(&self) -> Result<Vec<String>, CompletionError> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(self.health_timeout_secs))
            .send()
            .await
            .map_err(|e| self.classify(e, self.health_timeout_secs))?;
        if !response.status().is_success() {
            return Err(CompletionError::Other(format!("HTTP {}", response.status())));
        }
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Other(format!("malformed /api/tags reply: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn classify(&self, e: reqwest::Error, secs: u64) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout { secs }
        } else if e.is_connect() {
            CompletionError::Connection {
                endpoint: self.host.clone(),
                detail: e.to_string(),
            }
        } else {
            CompletionError::Other(e.to_string())
        }
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        let body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });

        let start = Instant::now();
        let response = self
            .http
            .post(format!("{}/api/generate", self.host))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::Other(format!(
                "HTTP {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| self.classify(e, self.timeout_secs))?;
        debug!(
            "Ollama {}: {} chars in {:?}",
            model,
            reply.response.len(),
            start.elapsed()
        );
        Ok(reply.response)
    }
}

impl CompletionClient for OllamaClient {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(self.generate(model, prompt))
    }

    fn describe(&self) -> String {
        format!("ollama at {}", self.host)
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Adapter from an edgequake-llm provider to [`CompletionClient`].
///
/// The provider is already bound to a model, so the `model` argument of
/// [`CompletionClient::complete`] is only used for logging.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, label: &str, config: &AnnotatorConfig) -> Self {
        info!("Using LLM provider '{}'", label);
        Self {
            provider,
            label: label.to_string(),
            options: CompletionOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
            timeout_secs: config.api_timeout_secs,
        }
    }

    async fn chat(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        let messages = [ChatMessage::user(prompt)];
        let start = Instant::now();
        let call = self.provider.chat(&messages, Some(&self.options));
        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), call).await {
            Err(_) => Err(CompletionError::Timeout {
                secs: self.timeout_secs,
            }),
            Ok(Err(e)) => Err(self.classify(e)),
            Ok(Ok(response)) => {
                debug!(
                    "{} {}: {} input tokens, {} output tokens, {:?}",
                    self.label,
                    model,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(response.content)
            }
        }
    }
}

impl ProviderClient {
    /// Map a provider error onto the completion boundary.
    fn classify(&self, e: LlmError) -> CompletionError {
        match e {
            LlmError::Timeout => CompletionError::Timeout {
                secs: self.timeout_secs,
            },
            LlmError::NetworkError(detail) => CompletionError::Connection {
                endpoint: self.label.clone(),
                detail,
            },
            other => CompletionError::Other(other.to_string()),
        }
    }
}

impl CompletionClient for ProviderClient {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(self.chat(model, prompt))
    }

    fn describe(&self) -> String {
        format!("edgequake-llm provider '{}'", self.label)
    }
}
