
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{Embedder, EmbeddingError, MultiVector};
use crate::config::Config;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Blocking HTTP client for an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self::from_url(base_url)
            .with_timeout(Duration::from_secs(config.ollama.timeout_seconds)))
    }

    #[inline]
    pub fn from_url(base_url: Url) -> Self {
        Self {
            base_url,
            agent: build_agent(DEFAULT_BACKOFF * 30),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; later retries double it
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self, model: &str) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;
        self.validate_model(model)
            .context("Model validation failed")?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);

        self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to ping Ollama server")?;

        Ok(())
    }

    /// Validate that `model` is available on the server
    #[inline]
    pub fn validate_model(&self, model: &str) -> Result<()> {
        let models = self.list_models().context("Failed to list models")?;

        if models.iter().any(|m| m.name == model) {
            debug!("Model {} is available", model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                model, available_models
            );
            Err(anyhow::anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                model,
                available_models
            ))
        }
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// One pooled embedding per input, in input order
    #[inline]
    pub fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let url = self
            .base_url
            .join("/api/embed")
            .context("Failed to build embedding URL")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model,
            input: texts,
        })
        .context("Failed to serialize embedding request")?;

        let response_text = self
            .post_json_with_retry(&url, &request_json)
            .context("Failed to generate embeddings")?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        Ok(response.embeddings)
    }

    /// Non-streaming chat completion; returns the assistant message content
    #[inline]
    pub fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = self
            .base_url
            .join("/api/chat")
            .context("Failed to build chat URL")?;
        let request_json = serde_json::to_string(&ChatRequest {
            model,
            messages,
            stream: false,
        })
        .context("Failed to serialize chat request")?;

        debug!("Sending {} chat messages to {}", messages.len(), model);

        let response_text = self
            .post_json_with_retry(&url, &request_json)
            .context("Failed to generate chat response")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        Ok(response.message.content)
    }

    fn post_json_with_retry(&self, url: &Url, body: &str) -> Result<String> {
        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Dense embedder backed by an Ollama embedding model.
///
/// Each text maps to a single pooled vector, exposed as a one-row multi-vector so that
/// max-sim scoring reduces to plain vector similarity.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(client: OllamaClient, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            OllamaClient::new(config)?,
            config.ollama.embedding_model.clone(),
            config.embedding.dimension as usize,
        ))
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let client = self.client.clone();
        let model = self.model.clone();

        tokio::task::spawn_blocking(move || client.embed(&model, &texts))
            .await
            .map_err(|e| EmbeddingError::Backend(format!("Embedding task failed: {}", e)))?
            .map_err(|e| EmbeddingError::Backend(format!("{:#}", e)))
    }

    fn to_multi_vector(&self, embedding: Vec<f32>) -> Result<MultiVector, EmbeddingError> {
        MultiVector::new(vec![embedding], self.dimension)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[inline]
    fn model_id(&self) -> String {
        format!("ollama/{}", self.model)
    }

    #[inline]
    fn dimensionality(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<MultiVector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let embedding = self
            .request(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                expected: 1,
                found: 0,
            })?;

        self.to_multi_vector(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<MultiVector>, EmbeddingError> {
        if let Some(index) = texts.iter().position(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::Item {
                index,
                source: Box::new(EmbeddingError::EmptyInput),
            });
        }

        let embeddings = self.request(texts.to_vec()).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                found: embeddings.len(),
            });
        }

        embeddings
            .into_iter()
            .enumerate()
            .map(|(index, embedding)| {
                self.to_multi_vector(embedding)
                    .map_err(|e| EmbeddingError::Item {
                        index,
                        source: Box::new(e),
                    })
            })
            .collect()
    }
}
