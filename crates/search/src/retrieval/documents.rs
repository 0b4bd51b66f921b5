//! Flowise document store client
//!
//! Implements vector search over named document stores, the store catalog,
//! and the single-shot chatflow prediction used as a degraded answer source.

use super::{StoreCatalog, VectorStore};
use async_trait::async_trait;
use futures::future::join_all;
use graphrag_common::config::VectorStoreConfig;
use graphrag_common::errors::{AppError, Result};
use graphrag_common::models::{StoreInfo, StoreStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorQueryRequest<'a> {
    store_id: &'a str,
    query: &'a str,
}

#[derive(Deserialize)]
struct VectorQueryResponse {
    #[serde(default)]
    docs: Vec<Document>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    page_content: Option<String>,
}

#[derive(Serialize)]
struct PredictionRequest<'a> {
    question: &'a str,
    #[serde(rename = "overrideConfig")]
    override_config: OverrideConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverrideConfig {
    return_source_documents: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictionResponse {
    source_documents: Option<Vec<Document>>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default)]
    id: String,
    name: Option<String>,
    description: Option<String>,
    status: Option<String>,
}

impl From<RawStore> for StoreInfo {
    fn from(raw: RawStore) -> Self {
        StoreInfo {
            id: raw.id,
            name: raw.name.unwrap_or_else(|| "Unnamed".to_string()),
            description: raw.description.unwrap_or_default(),
            status: StoreStatus::parse(raw.status.as_deref().unwrap_or("unknown")),
        }
    }
}

/// Client for a Flowise instance's document store and prediction APIs
pub struct FlowiseClient {
    client: reqwest::Client,
    base_url: String,
    chatflow_id: Option<String>,
    default_store_id: Option<String>,
    api_key: Option<String>,
}

impl FlowiseClient {
    /// Create a new client
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            chatflow_id: config.chatflow_id.clone().filter(|id| !id.is_empty()),
            default_store_id: config.default_store_id.clone().filter(|id| !id.is_empty()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    /// Selected stores, or the configured default when none are selected
    fn resolve_stores<'a>(&'a self, store_ids: &'a [String]) -> Result<Vec<&'a str>> {
        if !store_ids.is_empty() {
            return Ok(store_ids.iter().map(String::as_str).collect());
        }
        self.default_store_id
            .as_deref()
            .map(|id| vec![id])
            .ok_or(AppError::NoDocumentStore)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn query_store(&self, store_id: &str, text: &str, top_k: usize) -> Result<Vec<String>> {
        let url = format!("{}/document-store/vectorstore/query", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(&VectorQueryRequest { store_id, query: text })
            .send()
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::VectorStore {
                message: format!("Store {} returned {}", store_id, response.status()),
            });
        }

        let body: VectorQueryResponse = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(body
            .docs
            .into_iter()
            .take(top_k)
            .filter_map(|doc| doc.page_content)
            .collect())
    }
}

#[async_trait]
impl VectorStore for FlowiseClient {
    async fn query(&self, text: &str, top_k: usize, store_ids: &[String]) -> Result<Vec<String>> {
        let stores = self.resolve_stores(store_ids)?;

        let results = join_all(
            stores
                .iter()
                .map(|store_id| self.query_store(store_id, text, top_k)),
        )
        .await;

        let mut chunks = Vec::new();
        let mut failures = 0;
        for (store_id, result) in stores.iter().zip(results) {
            match result {
                Ok(docs) => chunks.extend(docs),
                Err(e) => {
                    failures += 1;
                    warn!(store_id, error = %e, "Vector store query failed, skipping store");
                }
            }
        }

        if failures == stores.len() {
            return Err(AppError::VectorStore {
                message: format!("All {} stores failed", failures),
            });
        }

        debug!(stores = stores.len(), results = chunks.len(), "Vector store query completed");
        Ok(chunks)
    }

    fn has_chatflow(&self) -> bool {
        self.chatflow_id.is_some()
    }

    async fn chatflow_answer(&self, question: &str) -> Result<Vec<String>> {
        let chatflow_id = self.chatflow_id.as_deref().ok_or_else(|| AppError::Configuration {
            message: "vector_store.chatflow_id is not configured".to_string(),
        })?;

        let url = format!("{}/prediction/{}", self.base_url, chatflow_id);
        let response = self
            .authorized(self.client.post(&url))
            .json(&PredictionRequest {
                question,
                override_config: OverrideConfig {
                    return_source_documents: true,
                },
            })
            .send()
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Prediction request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::VectorStore {
                message: format!("Prediction returned {}", response.status()),
            });
        }

        let body: Value = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("Failed to parse prediction: {}", e),
        })?;

        let parsed: PredictionResponse = match serde_json::from_value(body.clone()) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(vec![body.to_string()]),
        };

        Ok(match (parsed.source_documents, parsed.text) {
            (Some(docs), _) => docs.into_iter().filter_map(|d| d.page_content).collect(),
            (None, Some(text)) => vec![text],
            (None, None) => vec![body.to_string()],
        })
    }
}

#[async_trait]
impl StoreCatalog for FlowiseClient {
    async fn list(&self) -> Result<Vec<StoreInfo>> {
        let url = format!("{}/document-store/store", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Failed to list stores: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::VectorStore {
                message: format!("Store listing returned {}", response.status()),
            });
        }

        let stores: Vec<RawStore> = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("Failed to parse store list: {}", e),
        })?;

        Ok(stores.into_iter().map(StoreInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, default_store: Option<&str>) -> FlowiseClient {
        FlowiseClient::new(&VectorStoreConfig {
            api_url: server.uri(),
            chatflow_id: Some("flow-1".to_string()),
            default_store_id: default_store.map(str::to_string),
            api_key: Some("key".to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn docs(contents: &[&str]) -> serde_json::Value {
        json!({ "docs": contents.iter().map(|c| json!({ "pageContent": c, "metadata": {} })).collect::<Vec<_>>() })
    }

    #[tokio::test]
    async fn test_default_store_used_when_none_selected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/document-store/vectorstore/query"))
            .and(header("Authorization", "Bearer key"))
            .and(body_partial_json(json!({ "storeId": "default", "query": "capital" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(docs(&["a", "b", "c", "d"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("default"));
        let chunks = client.query("capital", 3, &[]).await.unwrap();
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_no_resolvable_store_signals_fallback() {
        let server = MockServer::start().await;
        let client = client_for(&server, None);
        let err = client.query("capital", 3, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::NoDocumentStore));
    }

    #[tokio::test]
    async fn test_failing_store_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "storeId": "good" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(docs(&["kept"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "storeId": "bad" })))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let stores = vec!["good".to_string(), "bad".to_string()];
        assert_eq!(client.query("q", 2, &stores).await.unwrap(), vec!["kept"]);

        let only_bad = vec!["bad".to_string()];
        assert!(matches!(
            client.query("q", 2, &only_bad).await,
            Err(AppError::VectorStore { .. })
        ));
    }

    #[tokio::test]
    async fn test_chatflow_prefers_source_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prediction/flow-1"))
            .and(body_partial_json(json!({ "overrideConfig": { "returnSourceDocuments": true } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "Hanoi",
                "sourceDocuments": [{ "pageContent": "Hanoi is the capital." }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert_eq!(
            client.chatflow_answer("capital?").await.unwrap(),
            vec!["Hanoi is the capital."]
        );
    }

    #[tokio::test]
    async fn test_chatflow_falls_back_to_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prediction/flow-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "Hanoi" })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert_eq!(client.chatflow_answer("capital?").await.unwrap(), vec!["Hanoi"]);
    }

    #[tokio::test]
    async fn test_list_stores() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-store/store"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "s1", "name": "Laws", "description": "Legal corpus", "status": "UPSERTED" },
                { "id": "s2", "status": "EMPTY" }
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let stores = client.list().await.unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0].name, "Laws");
        assert!(stores[0].status.is_searchable());
        assert_eq!(stores[1].name, "Unnamed");
        assert_eq!(stores[1].status, StoreStatus::Empty);
    }

    #[test]
    fn test_has_chatflow_follows_config() {
        let config = VectorStoreConfig::default();
        assert!(!FlowiseClient::new(&config).unwrap().has_chatflow());

        let config = VectorStoreConfig {
            chatflow_id: Some("flow-1".to_string()),
            ..VectorStoreConfig::default()
        };
        assert!(FlowiseClient::new(&config).unwrap().has_chatflow());
    }
}
