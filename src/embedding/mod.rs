//! Embedding providers and the faculty embedding service.

pub mod preprocess;
pub mod service;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use preprocess::Preprocessor;
pub use service::{EmbeddingService, FacultyHit};

const OPENAI_MAX_RETRIES: usize = 4;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be configured.
    #[error("Invalid embedding provider configuration: {0}")]
    InvalidConfig(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Deterministic local embedding client that hashes bytes into vector slots.
pub struct HashingClient {
    dimension: usize,
}

impl HashingClient {
    /// Construct a hashing client producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|text| Self::encode(&text, self.dimension))
            .collect())
    }
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client authenticating with `api_key` against `base_url`.
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, EmbeddingClientError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingClientError::InvalidConfig(
                "missing OpenAI API key".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| EmbeddingClientError::InvalidConfig("invalid OpenAI API key".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .map_err(|err| EmbeddingClientError::InvalidConfig(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            max_retries: OPENAI_MAX_RETRIES,
        })
    }

    fn should_retry(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn retry_backoff(attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(500 * (1 << capped))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let request = OpenAiRequest {
            model: &self.model,
            input: &texts,
        };
        let mut attempt = 0usize;
        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
            let status = response.status();

            if status.is_success() {
                let mut parsed: OpenAiResponse = response
                    .json()
                    .await
                    .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
                parsed.data.sort_by_key(|entry| entry.index);
                if parsed.data.len() != texts.len() {
                    return Err(EmbeddingClientError::GenerationFailed(format!(
                        "OpenAI returned {} embeddings for {} inputs",
                        parsed.data.len(),
                        texts.len()
                    )));
                }
                return Ok(parsed
                    .data
                    .into_iter()
                    .map(|entry| entry.embedding)
                    .collect());
            }

            let body = response.text().await.unwrap_or_default();
            if Self::should_retry(status) && attempt + 1 < self.max_retries {
                attempt += 1;
                tracing::warn!(%status, attempt, "OpenAI embeddings request throttled; retrying");
                tokio::time::sleep(Self::retry_backoff(attempt)).await;
                continue;
            }
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "OpenAI embeddings request failed ({status}): {body}"
            )));
        }
    }
}

/// Embeddings client for a local Ollama runtime.
pub struct OllamaClient {
    ollama: Ollama,
    model: String,
}

impl OllamaClient {
    /// Connect to the Ollama runtime at `url`.
    pub fn new(url: &str, model: &str) -> Result<Self, EmbeddingClientError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| EmbeddingClientError::InvalidConfig(format!("OLLAMA_URL: {err}")))?;
        let host = parsed.host_str().ok_or_else(|| {
            EmbeddingClientError::InvalidConfig("OLLAMA_URL has no host".to_string())
        })?;
        let port = parsed.port_or_known_default().unwrap_or(11434);

        Ok(Self {
            ollama: Ollama::new(format!("{}://{}", parsed.scheme(), host), port),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(texts));
        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|err| EmbeddingClientError::GenerationFailed(err.to_string()))?;
        Ok(response.embeddings)
    }
}

/// Build the embedding client selected by the configuration.
pub fn build_embedding_client(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingClient + Send + Sync>, EmbeddingClientError> {
    tracing::debug!(
        provider = ?config.provider,
        model = %config.model,
        dimension = config.dimension,
        "Building embedding client"
    );
    Ok(match config.provider {
        EmbeddingProvider::Hashing => Box::new(HashingClient::new(config.dimension)),
        EmbeddingProvider::OpenAI => Box::new(OpenAiClient::new(
            config.openai_api_key.as_deref().unwrap_or_default(),
            &config.openai_base_url,
            &config.model,
        )?),
        EmbeddingProvider::Ollama => Box::new(OllamaClient::new(&config.ollama_url, &config.model)?),
    })
}
