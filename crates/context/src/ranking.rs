//! Final relevance ordering of fused evidence

use crate::fusion::EvidenceItem;
use graphrag_common::metrics;
use graphrag_search::Reranker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct RankingStage {
    reranker: Arc<dyn Reranker>,
    top_k: usize,
    timeout: Duration,
}

impl RankingStage {
    pub fn new(reranker: Arc<dyn Reranker>, top_k: usize, timeout: Duration) -> Self {
        Self {
            reranker,
            top_k,
            timeout,
        }
    }

    /// Up to `top_k` contents, most relevant first.
    ///
    /// A failed or timed-out rerank keeps the fused order.
    pub async fn rank(&self, query: &str, items: &[EvidenceItem]) -> Vec<String> {
        if items.is_empty() {
            return Vec::new();
        }

        let documents: Vec<String> = items.iter().map(|i| i.content.clone()).collect();
        let provider = self.reranker.provider().as_str();

        let outcome =
            tokio::time::timeout(self.timeout, self.reranker.rerank(query, &documents, self.top_k))
                .await;

        match outcome {
            Ok(Ok(ranked)) => {
                debug!(provider, candidates = documents.len(), ranked = ranked.len(), "Ranking completed");
                ranked
            }
            Ok(Err(e)) => {
                warn!(provider, error = %e, "Rerank failed, keeping fused order");
                metrics::record_external_error("reranker");
                Self::head(documents, self.top_k)
            }
            Err(_) => {
                warn!(provider, timeout_ms = self.timeout.as_millis() as u64, "Rerank timed out, keeping fused order");
                metrics::record_external_error("reranker");
                Self::head(documents, self.top_k)
            }
        }
    }

    fn head(mut documents: Vec<String>, top_k: usize) -> Vec<String> {
        documents.truncate(top_k);
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::EvidenceOrigin;
    use async_trait::async_trait;
    use graphrag_common::errors::{AppError, Result};
    use graphrag_search::{PassthroughReranker, RerankerProvider};

    struct Reversing;

    #[async_trait]
    impl Reranker for Reversing {
        async fn rerank(&self, _q: &str, documents: &[String], top_k: usize) -> Result<Vec<String>> {
            Ok(documents.iter().rev().take(top_k).cloned().collect())
        }

        fn provider(&self) -> RerankerProvider {
            RerankerProvider::Jina
        }
    }

    struct Broken;

    #[async_trait]
    impl Reranker for Broken {
        async fn rerank(&self, _q: &str, _d: &[String], _k: usize) -> Result<Vec<String>> {
            Err(AppError::Reranker {
                message: "401 Unauthorized".to_string(),
            })
        }

        fn provider(&self) -> RerankerProvider {
            RerankerProvider::Cohere
        }
    }

    fn items(contents: &[&str]) -> Vec<EvidenceItem> {
        contents
            .iter()
            .map(|c| EvidenceItem {
                content: c.to_string(),
                origin: EvidenceOrigin::Vector,
            })
            .collect()
    }

    fn stage(reranker: Arc<dyn Reranker>, top_k: usize) -> RankingStage {
        RankingStage::new(reranker, top_k, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_reranker_order_is_used() {
        let ranked = stage(Arc::new(Reversing), 2).rank("q", &items(&["a", "b", "c"])).await;
        assert_eq!(ranked, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_head() {
        let ranked = stage(Arc::new(Broken), 2).rank("q", &items(&["a", "b", "c"])).await;
        assert_eq!(ranked, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_passthrough_for_every_k() {
        let input = items(&["a", "b", "c", "d"]);
        for k in 0..=input.len() {
            let ranked = stage(Arc::new(PassthroughReranker), k).rank("any", &input).await;
            let expected: Vec<String> = input[..k].iter().map(|i| i.content.clone()).collect();
            assert_eq!(ranked, expected);
        }
    }

    #[test]
    fn test_empty_input() {
        let ranked = tokio_test::block_on(stage(Arc::new(Broken), 5).rank("q", &[]));
        assert!(ranked.is_empty());
    }
}
