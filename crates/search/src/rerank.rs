//! Second-pass relevance reranking
//!
//! Jina and Cohere share the same request and response shape, so a single
//! HTTP client serves both; the `none` provider is an identity pass-through.

use async_trait::async_trait;
use graphrag_common::config::RerankerConfig;
use graphrag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reranking backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankerProvider {
    Jina,
    Cohere,
    None,
}

impl RerankerProvider {
    /// Parse a configured provider name; unknown names disable reranking
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "jina" => RerankerProvider::Jina,
            "cohere" => RerankerProvider::Cohere,
            "none" => RerankerProvider::None,
            other => {
                warn!(provider = other, "Unknown reranker provider, disabling reranking");
                RerankerProvider::None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RerankerProvider::Jina => "jina",
            RerankerProvider::Cohere => "cohere",
            RerankerProvider::None => "none",
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            RerankerProvider::Jina => "https://api.jina.ai/v1/rerank",
            RerankerProvider::Cohere => "https://api.cohere.ai/v1/rerank",
            RerankerProvider::None => "",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            RerankerProvider::Jina => "jina-reranker-v3",
            RerankerProvider::Cohere => "rerank-english-v3.0",
            RerankerProvider::None => "",
        }
    }
}

/// Stateless reordering of candidate documents by relevance to a query
#[async_trait]
pub trait Reranker: Send + Sync {
    /// At most `top_k` of `documents`, most relevant first
    async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Result<Vec<String>>;

    fn provider(&self) -> RerankerProvider;
}

/// Keeps the input order
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(&self, _query: &str, documents: &[String], top_k: usize) -> Result<Vec<String>> {
        Ok(documents.iter().take(top_k).cloned().collect())
    }

    fn provider(&self) -> RerankerProvider {
        RerankerProvider::None
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    top_n: usize,
    documents: &'a [String],
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: Option<usize>,
    document: Option<RerankDocument>,
}

#[derive(Deserialize)]
struct RerankDocument {
    text: Option<String>,
}

/// Hosted reranker speaking the Jina/Cohere rerank API
pub struct HttpReranker {
    client: reqwest::Client,
    provider: RerankerProvider,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpReranker {
    pub fn new(
        provider: RerankerProvider,
        api_key: String,
        model: Option<String>,
        endpoint: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            provider,
            endpoint: endpoint.unwrap_or_else(|| provider.default_endpoint().to_string()),
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Result<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&RerankRequest {
                model: &self.model,
                query,
                top_n: top_k,
                documents,
                return_documents: true,
            })
            .send()
            .await
            .map_err(|e| AppError::Reranker {
                message: format!("{} request failed: {}", self.provider.as_str(), e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Reranker {
                message: format!("{} error {}: {}", self.provider.as_str(), status, body),
            });
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| AppError::Reranker {
            message: format!("Failed to parse rerank response: {}", e),
        })?;

        let ranked: Vec<String> = parsed
            .results
            .into_iter()
            .filter_map(|r| {
                r.document
                    .and_then(|d| d.text)
                    .or_else(|| r.index.and_then(|i| documents.get(i).cloned()))
            })
            .take(top_k)
            .collect();

        debug!(
            provider = self.provider.as_str(),
            candidates = documents.len(),
            ranked = ranked.len(),
            "Rerank completed"
        );
        Ok(ranked)
    }

    fn provider(&self) -> RerankerProvider {
        self.provider
    }
}

/// Create a reranker based on configuration
pub fn create_reranker(config: &RerankerConfig) -> Result<Arc<dyn Reranker>> {
    let provider = RerankerProvider::parse(&config.provider);
    if provider == RerankerProvider::None {
        info!("Reranker disabled, using original document order");
        return Ok(Arc::new(PassthroughReranker));
    }

    let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
        warn!(provider = provider.as_str(), "Reranker API key missing, disabling reranking");
        return Ok(Arc::new(PassthroughReranker));
    };

    let reranker = HttpReranker::new(
        provider,
        api_key,
        config.model.clone(),
        config.endpoint.clone(),
        config.timeout_secs,
    )?;
    info!(provider = provider.as_str(), model = %reranker.model, "Using hosted reranker");
    Ok(Arc::new(reranker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(RerankerProvider::parse("Jina"), RerankerProvider::Jina);
        assert_eq!(RerankerProvider::parse("cohere"), RerankerProvider::Cohere);
        assert_eq!(RerankerProvider::parse("none"), RerankerProvider::None);
        assert_eq!(RerankerProvider::parse("qwen"), RerankerProvider::None);
    }

    #[tokio::test]
    async fn test_passthrough_keeps_order() {
        let items = docs(&["a", "b", "c", "d"]);
        for k in 0..=items.len() {
            let out = PassthroughReranker.rerank("anything", &items, k).await.unwrap();
            assert_eq!(out, items[..k].to_vec());
        }
    }

    #[tokio::test]
    async fn test_http_reranker_reads_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer jina-key"))
            .and(body_partial_json(json!({
                "model": "jina-reranker-v3",
                "query": "capital",
                "top_n": 2,
                "return_documents": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "index": 2, "relevance_score": 0.9, "document": { "text": "c" } },
                    { "index": 0, "relevance_score": 0.4 }
                ]
            })))
            .mount(&server)
            .await;

        let reranker = HttpReranker::new(
            RerankerProvider::Jina,
            "jina-key".to_string(),
            None,
            Some(server.uri()),
            5,
        )
        .unwrap();

        let out = reranker.rerank("capital", &docs(&["a", "b", "c"]), 2).await.unwrap();
        assert_eq!(out, docs(&["c", "a"]));
    }

    #[tokio::test]
    async fn test_http_reranker_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let reranker = HttpReranker::new(
            RerankerProvider::Cohere,
            "k".to_string(),
            None,
            Some(server.uri()),
            5,
        )
        .unwrap();

        let err = reranker.rerank("q", &docs(&["a"]), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Reranker { .. }));
    }

    #[tokio::test]
    async fn test_empty_input_skips_network() {
        let reranker = HttpReranker::new(
            RerankerProvider::Jina,
            "k".to_string(),
            None,
            Some("http://127.0.0.1:9".to_string()),
            1,
        )
        .unwrap();
        assert!(reranker.rerank("q", &[], 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_key_disables_reranking() {
        let config = RerankerConfig {
            provider: "jina".to_string(),
            api_key: None,
            ..RerankerConfig::default()
        };
        let reranker = create_reranker(&config).unwrap();
        assert_eq!(reranker.provider(), RerankerProvider::None);
    }
}
