//! GraphRAG Common Library
//!
//! Shared code for the GraphRAG crates including:
//! - Error types and the pipeline failure taxonomy
//! - Configuration management
//! - Metrics and observability
//! - Embedding client abstraction
//! - Retrieval records (graph hits, document store catalog entries)

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, FailureClass, Result};
pub use models::{GraphHit, GraphRelationship, StoreInfo};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
