//! Embedding service abstraction
//!
//! Provides a unified interface for the embedding providers used to
//! vectorise queries before graph similarity search:
//! - Ollama (nomic-embed-text, mxbai-embed-large, all-minilm)
//! - OpenAI (text-embedding-3-small, text-embedding-3-large)
//! - Mock (random vectors, for local development)

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11435";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Wire format of the concrete providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Ollama,
    OpenAI,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

/// HTTP embedding client for Ollama and OpenAI-style APIs
pub struct HttpEmbedder {
    client: reqwest::Client,
    provider: Provider,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_retries: u32,
    retry_interval: Duration,
    timeout: Duration,
}

impl HttpEmbedder {
    /// Create an Ollama embedder (`POST {base}/api/embeddings`)
    pub fn ollama(base_url: Option<String>, model: String, timeout_secs: u64) -> Result<Self> {
        Self::build(
            Provider::Ollama,
            None,
            model,
            base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            timeout_secs,
        )
    }

    /// Create an OpenAI embedder (`POST {base}/embeddings`)
    pub fn openai(
        api_key: String,
        base_url: Option<String>,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        Self::build(
            Provider::OpenAI,
            Some(api_key),
            model,
            base_url.unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            timeout_secs,
        )
    }

    fn build(
        provider: Provider,
        api_key: Option<String>,
        model: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            provider,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 3,
            retry_interval: Duration::from_millis(100),
            timeout,
        })
    }

    /// Override the retry policy
    pub fn with_retries(mut self, max_retries: u32, interval: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_interval = interval;
        self
    }

    /// Make request with exponential backoff
    async fn request_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let policy = ExponentialBackoff {
            initial_interval: self.retry_interval,
            max_elapsed_time: Some(self.timeout),
            ..ExponentialBackoff::default()
        };

        let max_retries = self.max_retries;
        let mut attempt = 0u32;

        retry(policy, || {
            attempt += 1;
            let current = attempt;
            async move {
                match self.make_request(text).await {
                    Ok(embedding) => Ok(embedding),
                    Err(e) if current <= max_retries => {
                        tracing::warn!(
                            attempt = current,
                            max_retries = max_retries,
                            error = %e,
                            "Embedding request failed, retrying"
                        );
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn make_request(&self, text: &str) -> Result<Vec<f32>> {
        let request = match self.provider {
            Provider::Ollama => self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&OllamaRequest {
                    model: &self.model,
                    prompt: text,
                }),
            Provider::OpenAI => self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .header(
                    "Authorization",
                    format!("Bearer {}", self.api_key.as_deref().unwrap_or_default()),
                )
                .json(&OpenAIRequest {
                    input: vec![text],
                    model: &self.model,
                }),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::EmbeddingTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                AppError::EmbeddingError {
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let embedding = match self.provider {
            Provider::Ollama => {
                let parsed: OllamaResponse = response.json().await.map_err(|e| {
                    AppError::EmbeddingError {
                        message: format!("Failed to parse response: {}", e),
                    }
                })?;
                parsed.embedding
            }
            Provider::OpenAI => {
                let parsed: OpenAIResponse = response.json().await.map_err(|e| {
                    AppError::EmbeddingError {
                        message: format!("Failed to parse response: {}", e),
                    }
                })?;
                parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|e| e.embedding)
                    .unwrap_or_default()
            }
        };

        if embedding.is_empty() {
            return Err(AppError::EmbeddingError {
                message: "Empty embedding in response".to_string(),
            });
        }

        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result = self.request_with_retry(text).await;
        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock embedder for testing
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        Ok((0..self.dimension).map(|_| rng.gen::<f32>()).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            let embedder = HttpEmbedder::ollama(
                config.api_base.clone(),
                config.model.clone(),
                config.timeout_secs,
            )?
            .with_retries(config.max_retries, Duration::from_millis(100));
            Ok(Arc::new(embedder))
        }
        "openai" => {
            let key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| AppError::Configuration {
                    message: "OpenAI embedding provider requires embedding.api_key".to_string(),
                })?;
            let embedder = HttpEmbedder::openai(
                key,
                config.api_base.clone(),
                config.model.clone(),
                config.timeout_secs,
            )?
            .with_retries(config.max_retries, Duration::from_millis(100));
            Ok(Arc::new(embedder))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(768))),
        other => {
            tracing::warn!(provider = other, "Unknown embedding provider, using mock");
            Ok(Arc::new(MockEmbedder::new(768)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_mock_embedder() {
        let embedder = MockEmbedder::new(768);
        let embedding = embedder.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 768);
    }

    #[tokio::test]
    async fn test_ollama_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "model": "nomic-embed-text",
                "prompt": "capital of Vietnam",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embedding": [0.1, 0.2, 0.3] })),
            )
            .mount(&server)
            .await;

        let embedder =
            HttpEmbedder::ollama(Some(server.uri()), "nomic-embed-text".to_string(), 5).unwrap();
        let embedding = embedder.embed("capital of Vietnam").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_openai_embedding_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [1.0, 0.0] }]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::openai(
            "sk-test".to_string(),
            Some(server.uri()),
            "text-embedding-3-small".to_string(),
            5,
        )
        .unwrap();
        assert_eq!(embedder.embed("x").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_retry_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": [0.5] })),
            )
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::ollama(Some(server.uri()), "m".to_string(), 5)
            .unwrap()
            .with_retries(2, Duration::from_millis(1));
        assert_eq!(embedder.embed("x").await.unwrap(), vec![0.5]);
    }

    #[tokio::test]
    async fn test_empty_embedding_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::ollama(Some(server.uri()), "m".to_string(), 5)
            .unwrap()
            .with_retries(0, Duration::from_millis(1));
        let err = embedder.embed("x").await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingError { .. }));
    }

    #[test]
    fn test_openai_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_unknown_provider_uses_mock() {
        let config = EmbeddingConfig {
            provider: "sentence-transformers".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "mock-embedding");
    }
}
