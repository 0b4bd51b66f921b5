//! Query orchestration
//!
//! One call to [`RagAgent::answer`] walks the stage machine
//!
//! ```text
//! GRAPH_SEARCH -> VARIANT_BUILD -> RETRIEVE -> FUSE -> RANK -> SYNTHESIZE -> DONE | ERROR
//! ```
//!
//! Every stage before synthesis degrades to an empty result on failure.
//! The answer is committed to the session's history only when the model
//! stream completes; dropping the returned stream cancels generation and
//! commits nothing.

use crate::fusion::EvidenceFuser;
use crate::graph_context::GraphContext;
use crate::ranking::RankingStage;
use crate::retriever::{EvidenceRetriever, RetrieverSettings};
use crate::session::Session;
use crate::synthesizer::{build_prompt, fallback_notice, AnswerChunk, LanguageModel};
use crate::variants::QueryVariantBuilder;
use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use graphrag_common::config::AppConfig;
use graphrag_common::metrics;
use graphrag_search::{GraphSearch, Reranker, VectorStore};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    GraphSearch,
    VariantBuild,
    Retrieve,
    Fuse,
    Rank,
    Synthesize,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::GraphSearch => "graph_search",
            Stage::VariantBuild => "variant_build",
            Stage::Retrieve => "retrieve",
            Stage::Fuse => "fuse",
            Stage::Rank => "rank",
            Stage::Synthesize => "synthesize",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Counts and timings of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub contextual_query: String,
    pub graph_hits: usize,
    pub variants: usize,
    pub vector_results: usize,
    pub fused: usize,
    pub ranked: usize,
    pub stages: Vec<StageTiming>,
}

impl PipelineReport {
    fn complete(&mut self, stage: Stage, started: Instant) {
        let elapsed = started.elapsed();
        metrics::record_stage(stage.as_str(), elapsed.as_secs_f64());
        info!(
            stage = %stage,
            latency_ms = elapsed.as_millis() as u64,
            "Pipeline stage completed"
        );
        self.stages.push(StageTiming {
            stage,
            duration_ms: elapsed.as_millis() as u64,
        });
    }
}

/// Ranked evidence ready for synthesis
#[derive(Debug, Clone)]
pub struct PreparedEvidence {
    pub ranked: Vec<String>,
    pub report: PipelineReport,
}

/// Tunables of the orchestration pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retriever: RetrieverSettings,
    pub rerank_top_k: usize,
    pub rerank_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retriever: RetrieverSettings::default(),
            rerank_top_k: 5,
            rerank_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            retriever: RetrieverSettings {
                graph_top_k: config.graph.top_k,
                call_timeout: config.call_timeout(),
                chatflow_fallback: config.pipeline.chatflow_fallback,
            },
            rerank_top_k: config.reranker.top_k,
            rerank_timeout: Duration::from_secs(config.reranker.timeout_secs),
        }
    }
}

/// Records a cancelled synthesis unless the stream reached a terminal state
struct SynthesisGuard {
    finished: bool,
}

impl SynthesisGuard {
    fn new() -> Self {
        Self { finished: false }
    }

    fn finish(&mut self, outcome: &str) {
        self.finished = true;
        metrics::record_synthesis(outcome);
    }
}

impl Drop for SynthesisGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!("Answer stream dropped before completion, nothing committed");
            metrics::record_synthesis("cancelled");
        }
    }
}

/// Answers questions for sessions by combining graph and document evidence
pub struct RagAgent {
    retriever: EvidenceRetriever,
    ranking: RankingStage,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl RagAgent {
    pub fn new(
        graph: Arc<dyn GraphSearch>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        llm: Option<Arc<dyn LanguageModel>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever: EvidenceRetriever::new(graph, store, settings.retriever),
            ranking: RankingStage::new(reranker, settings.rerank_top_k, settings.rerank_timeout),
            llm,
        }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Run every stage up to synthesis
    pub async fn prepare(&self, session: &Session, query: &str) -> PreparedEvidence {
        let conversation = &session.conversation;
        let store_ids = session.selected_stores();
        let mut report = PipelineReport::default();

        let contextual_query = conversation.derive_contextual_query(query);
        info!(
            query,
            contextual_query = %contextual_query,
            history = conversation.len(),
            stores = store_ids.len(),
            "Processing query"
        );

        // Conversation variants do not depend on graph results, so they
        // are searched alongside the graph.
        let started = Instant::now();
        let conversational = QueryVariantBuilder::conversational(query, conversation);
        let (hits, mut results) = futures::join!(
            self.retriever.search_graph(&contextual_query),
            self.retriever.search_variants(&conversational, store_ids),
        );
        report.graph_hits = hits.len();
        report.complete(Stage::GraphSearch, started);

        let started = Instant::now();
        let graph_context = GraphContext::extract(&hits);
        let graph_guided = QueryVariantBuilder::graph_guided(query, &graph_context);
        report.variants = conversational.len() + graph_guided.len();
        report.complete(Stage::VariantBuild, started);

        let started = Instant::now();
        results.extend(self.retriever.search_variants(&graph_guided, store_ids).await);
        report.vector_results = results.iter().map(|r| r.documents.len()).sum();
        report.complete(Stage::Retrieve, started);

        let started = Instant::now();
        let fused = EvidenceFuser::fuse(&hits, &results);
        report.fused = fused.len();
        metrics::record_evidence("fused", fused.len());
        report.complete(Stage::Fuse, started);

        let started = Instant::now();
        let ranked = self.ranking.rank(query, &fused).await;
        report.ranked = ranked.len();
        metrics::record_evidence("ranked", ranked.len());
        report.complete(Stage::Rank, started);

        report.contextual_query = contextual_query;
        PreparedEvidence { ranked, report }
    }

    /// Stream the answer to `query`, committing it to the session on success
    pub fn answer<'a>(
        &'a self,
        session: &'a mut Session,
        query: &'a str,
    ) -> BoxStream<'a, AnswerChunk> {
        Box::pin(stream! {
            let pipeline_start = Instant::now();
            metrics::record_query();
            session.touch();

            let PreparedEvidence { ranked, mut report } = self.prepare(session, query).await;

            let started = Instant::now();
            let mut guard = SynthesisGuard::new();

            let Some(llm) = self.llm.as_ref() else {
                guard.finish("fallback");
                report.complete(Stage::Synthesize, started);
                info!(stage = %Stage::Done, "No LLM configured, returned retrieved evidence");
                yield AnswerChunk::Notice(fallback_notice(&ranked));
                return;
            };

            let prompt = build_prompt(&session.conversation.prompt_context(), &ranked, query);
            let mut fragments = llm.stream(prompt);
            let mut answer = String::new();

            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(text) => {
                        answer.push_str(&text);
                        yield AnswerChunk::Token(text);
                    }
                    Err(e) => {
                        guard.finish("failed");
                        report.complete(Stage::Synthesize, started);
                        error!(stage = %Stage::Error, error = %e, "Synthesis failed, history unchanged");
                        yield AnswerChunk::Error(format!("Error generating response: {}", e));
                        return;
                    }
                }
            }

            session.conversation.append(query, answer);
            session.touch();
            guard.finish("completed");
            report.complete(Stage::Synthesize, started);

            info!(
                stage = %Stage::Done,
                model = llm.model_name(),
                graph_hits = report.graph_hits,
                variants = report.variants,
                vector_results = report.vector_results,
                fused = report.fused,
                ranked = report.ranked,
                history = session.conversation.len(),
                latency_ms = pipeline_start.elapsed().as_millis() as u64,
                "Pipeline completed"
            );
        })
    }
}
