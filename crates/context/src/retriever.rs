//! Evidence retrieval fan-out
//!
//! Every external call runs under its own timeout and degrades to an empty
//! result on failure; nothing here can abort a query.

use crate::variants::QueryVariant;
use futures::future::join_all;
use graphrag_common::errors::{AppError, Result};
use graphrag_common::metrics;
use graphrag_common::models::GraphHit;
use graphrag_search::{GraphSearch, VectorStore};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Documents returned for one query variant
#[derive(Debug, Clone)]
pub struct VariantResult {
    pub variant: QueryVariant,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub graph_top_k: usize,
    pub call_timeout: Duration,
    /// Substitute the chatflow answer when no document store is resolvable
    pub chatflow_fallback: bool,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            graph_top_k: 5,
            call_timeout: Duration::from_millis(15_000),
            chatflow_fallback: true,
        }
    }
}

pub struct EvidenceRetriever {
    graph: Arc<dyn GraphSearch>,
    store: Arc<dyn VectorStore>,
    settings: RetrieverSettings,
}

impl EvidenceRetriever {
    pub fn new(
        graph: Arc<dyn GraphSearch>,
        store: Arc<dyn VectorStore>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            graph,
            store,
            settings,
        }
    }

    /// Graph similarity search; empty on failure or timeout
    pub async fn search_graph(&self, query: &str) -> Vec<GraphHit> {
        let start = Instant::now();
        let outcome = self
            .bounded("graph", self.graph.vector_search(query, self.settings.graph_top_k))
            .await;

        match outcome {
            Ok(hits) => {
                debug!(
                    results = hits.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Graph search completed"
                );
                hits
            }
            Err(e) => {
                warn!(error = %e, "Graph search failed, continuing without graph evidence");
                metrics::record_external_error("graph");
                Vec::new()
            }
        }
    }

    /// Run every variant concurrently; results keep the input order
    pub async fn search_variants(
        &self,
        variants: &[QueryVariant],
        store_ids: &[String],
    ) -> Vec<VariantResult> {
        join_all(variants.iter().map(|variant| async move {
            VariantResult {
                variant: variant.clone(),
                documents: self.search_variant(variant, store_ids).await,
            }
        }))
        .await
    }

    async fn search_variant(&self, variant: &QueryVariant, store_ids: &[String]) -> Vec<String> {
        let start = Instant::now();
        let outcome = self
            .bounded("vector_store", self.query_store(variant, store_ids))
            .await;

        match outcome {
            Ok(documents) => {
                debug!(
                    variant = %variant.kind,
                    results = documents.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Vector search completed"
                );
                documents
            }
            Err(e) => {
                warn!(variant = %variant.kind, error = %e, "Vector search failed, variant contributes nothing");
                metrics::record_external_error("vector_store");
                Vec::new()
            }
        }
    }

    async fn query_store(&self, variant: &QueryVariant, store_ids: &[String]) -> Result<Vec<String>> {
        match self.store.query(&variant.text, variant.top_k, store_ids).await {
            Err(AppError::NoDocumentStore)
                if self.settings.chatflow_fallback && self.store.has_chatflow() =>
            {
                debug!(variant = %variant.kind, "No document store resolvable, using chatflow answer");
                self.store.chatflow_answer(&variant.text).await
            }
            Err(AppError::NoDocumentStore) => {
                debug!(variant = %variant.kind, "No document store resolvable");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn bounded<T>(
        &self,
        service: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.settings.call_timeout, call)
            .await
            .map_err(|_| AppError::Timeout {
                service: service.to_string(),
                timeout_ms: self.settings.call_timeout.as_millis() as u64,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::VariantKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct SlowGraph;

    #[async_trait]
    impl GraphSearch for SlowGraph {
        async fn vector_search(&self, _query: &str, _top_k: usize) -> Result<Vec<GraphHit>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    struct FailingGraph;

    #[async_trait]
    impl GraphSearch for FailingGraph {
        async fn vector_search(&self, _query: &str, _top_k: usize) -> Result<Vec<GraphHit>> {
            Err(AppError::GraphSearch {
                message: "connection refused".to_string(),
            })
        }
    }

    /// Echoes the query; fails for texts containing "fail"
    #[derive(Default)]
    struct EchoStore {
        default_store: Option<String>,
        no_chatflow: bool,
        calls: Mutex<Vec<(String, usize, Vec<String>)>>,
        chatflow_calls: Mutex<usize>,
    }

    #[async_trait]
    impl VectorStore for EchoStore {
        async fn query(&self, text: &str, top_k: usize, store_ids: &[String]) -> Result<Vec<String>> {
            let resolved = if store_ids.is_empty() {
                match &self.default_store {
                    Some(id) => vec![id.clone()],
                    None => return Err(AppError::NoDocumentStore),
                }
            } else {
                store_ids.to_vec()
            };
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), top_k, resolved));
            if text.contains("fail") {
                return Err(AppError::VectorStore {
                    message: "boom".to_string(),
                });
            }
            Ok(vec![format!("doc for {}", text)])
        }

        fn has_chatflow(&self) -> bool {
            !self.no_chatflow
        }

        async fn chatflow_answer(&self, question: &str) -> Result<Vec<String>> {
            *self.chatflow_calls.lock().unwrap() += 1;
            Ok(vec![format!("chatflow: {}", question)])
        }
    }

    fn retriever(
        graph: Arc<dyn GraphSearch>,
        store: Arc<EchoStore>,
        chatflow_fallback: bool,
    ) -> EvidenceRetriever {
        EvidenceRetriever::new(
            graph,
            store,
            RetrieverSettings {
                graph_top_k: 5,
                call_timeout: Duration::from_millis(50),
                chatflow_fallback,
            },
        )
    }

    #[tokio::test]
    async fn test_graph_timeout_degrades_to_empty() {
        let store = Arc::new(EchoStore::default());
        let retriever = retriever(Arc::new(SlowGraph), store, true);
        assert!(retriever.search_graph("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_graph_failure_degrades_to_empty() {
        let store = Arc::new(EchoStore::default());
        let retriever = retriever(Arc::new(FailingGraph), store, true);
        assert!(retriever.search_graph("q").await.is_empty());
    }

    #[tokio::test]
    async fn test_variants_keep_order_and_isolate_failures() {
        let store = Arc::new(EchoStore {
            default_store: Some("default".to_string()),
            ..Default::default()
        });
        let retriever = retriever(Arc::new(FailingGraph), store.clone(), true);

        let variants = vec![
            QueryVariant::new(VariantKind::Original, "capital"),
            QueryVariant::new(VariantKind::Summary, "please fail"),
            QueryVariant::new(VariantKind::FollowUp, "more"),
        ];
        let results = retriever.search_variants(&variants, &[]).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].documents, vec!["doc for capital"]);
        assert!(results[1].documents.is_empty());
        assert_eq!(results[2].variant.kind, VariantKind::FollowUp);
        assert_eq!(results[2].documents, vec!["doc for more"]);

        let calls = store.calls.lock().unwrap();
        assert!(calls.iter().all(|(_, _, stores)| stores == &vec!["default".to_string()]));
        let original = calls.iter().find(|(t, _, _)| t == "capital").unwrap();
        assert_eq!(original.1, 3);
    }

    #[tokio::test]
    async fn test_selected_stores_are_passed_through() {
        let store = Arc::new(EchoStore::default());
        let retriever = retriever(Arc::new(FailingGraph), store.clone(), true);

        let selected = vec!["laws".to_string(), "news".to_string()];
        let variants = vec![QueryVariant::new(VariantKind::Original, "q")];
        retriever.search_variants(&variants, &selected).await;

        assert_eq!(store.calls.lock().unwrap()[0].2, selected);
    }

    #[tokio::test]
    async fn test_missing_store_uses_chatflow_when_enabled() {
        let store = Arc::new(EchoStore::default());
        let retriever = retriever(Arc::new(FailingGraph), store.clone(), true);

        let variants = vec![QueryVariant::new(VariantKind::Original, "capital")];
        let results = retriever.search_variants(&variants, &[]).await;

        assert_eq!(results[0].documents, vec!["chatflow: capital"]);
        assert_eq!(*store.chatflow_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_store_is_empty_when_fallback_disabled() {
        let store = Arc::new(EchoStore::default());
        let retriever = retriever(Arc::new(FailingGraph), store.clone(), false);

        let variants = vec![QueryVariant::new(VariantKind::Original, "capital")];
        let results = retriever.search_variants(&variants, &[]).await;

        assert!(results[0].documents.is_empty());
        assert_eq!(*store.chatflow_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_store_without_chatflow_is_empty() {
        let store = Arc::new(EchoStore {
            no_chatflow: true,
            ..Default::default()
        });
        let retriever = retriever(Arc::new(FailingGraph), store.clone(), true);

        let variants = vec![
            QueryVariant::new(VariantKind::Original, "capital"),
            QueryVariant::new(VariantKind::Summary, "budget"),
        ];
        let results = retriever.search_variants(&variants, &[]).await;

        assert!(results.iter().all(|r| r.documents.is_empty()));
        assert_eq!(*store.chatflow_calls.lock().unwrap(), 0);
    }
}
