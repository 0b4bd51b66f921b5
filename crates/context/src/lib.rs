//! GraphRAG Context Engine
//!
//! Turns one user query plus session history into ranked evidence and a
//! streamed answer:
//! - Conversation history and contextual query derivation
//! - Graph context extraction
//! - Multi-strategy query variants
//! - Concurrent evidence retrieval, fusion and reranking
//! - Streaming synthesis

pub mod conversation;
pub mod fusion;
pub mod graph_context;
pub mod pipeline;
pub mod ranking;
pub mod retriever;
pub mod session;
pub mod synthesizer;
pub mod variants;

mod text;

pub use conversation::{ConversationStore, Exchange, HeuristicExtractor, KeyTermExtractor};
pub use fusion::{EvidenceFuser, EvidenceItem, EvidenceOrigin};
pub use graph_context::GraphContext;
pub use pipeline::{PipelineReport, PipelineSettings, RagAgent, Stage};
pub use session::{Session, SessionSnapshot};
pub use synthesizer::{create_language_model, AnswerChunk, LanguageModel, OpenAiCompatibleLlm};
pub use variants::{QueryVariant, QueryVariantBuilder, VariantKind};
