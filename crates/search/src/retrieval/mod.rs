//! Retrieval collaborators of the query pipeline
//!
//! Two independent sources of evidence:
//! - Knowledge graph similarity search (Neo4j)
//! - Document store vector search (Flowise document stores)

mod documents;
mod graph;

pub use documents::FlowiseClient;
pub use graph::Neo4jGraphSearch;

use async_trait::async_trait;
use graphrag_common::errors::Result;
use graphrag_common::models::{GraphHit, StoreInfo};

/// Embedding-based similarity search over knowledge graph nodes
#[async_trait]
pub trait GraphSearch: Send + Sync {
    /// Up to `top_k` hits with score above the similarity floor, best first,
    /// each with its first-degree relationships
    async fn vector_search(&self, query: &str, top_k: usize) -> Result<Vec<GraphHit>>;
}

/// Vector search over named document stores
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Query every store in `store_ids` (or the default store when empty),
    /// keeping up to `top_k` chunks per store.
    ///
    /// Returns [`AppError::NoDocumentStore`](graphrag_common::AppError::NoDocumentStore)
    /// when no store can be resolved.
    async fn query(&self, text: &str, top_k: usize, store_ids: &[String]) -> Result<Vec<String>>;

    /// Degraded single-shot answer used when no store is resolvable
    async fn chatflow_answer(&self, question: &str) -> Result<Vec<String>>;

    /// Whether [`chatflow_answer`](Self::chatflow_answer) has a chatflow to call
    fn has_chatflow(&self) -> bool {
        true
    }
}

/// Lists the document stores a session may select
#[async_trait]
pub trait StoreCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<StoreInfo>>;
}
