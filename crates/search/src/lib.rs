//! GraphRAG Search Library
//!
//! Clients for the external collaborators of the query pipeline:
//! - Knowledge graph similarity search
//! - Document store vector search and catalog
//! - Reranking

pub mod rerank;
pub mod retrieval;

pub use rerank::{create_reranker, PassthroughReranker, Reranker, RerankerProvider};
pub use retrieval::{FlowiseClient, GraphSearch, Neo4jGraphSearch, StoreCatalog, VectorStore};
